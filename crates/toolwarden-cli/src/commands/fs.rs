use anyhow::Result;

use fs_gateway::FileBody;

use super::Session;

#[derive(Debug)]
pub enum FsAction {
    Read { path: String, encoding: String },
    Write { path: String, content: String, no_create_dirs: bool },
    List { path: String, all: bool, recursive: bool },
    Mkdir { path: String, no_parents: bool },
    Rm { path: String, recursive: bool },
    Info { path: String },
}

pub fn execute(session: &Session, action: FsAction) -> Result<()> {
    let gateway = session.filesystem();
    match action {
        FsAction::Read { path, encoding } => {
            let result = gateway.read_file(&path, &encoding);
            match result {
                Ok(content) if !session.json => {
                    match content.body {
                        FileBody::Text { content } => print!("{content}"),
                        FileBody::Binary { content_base64 } => println!("{content_base64}"),
                    }
                    Ok(())
                }
                other => session.emit(other),
            }
        }
        FsAction::Write {
            path,
            content,
            no_create_dirs,
        } => session.emit(gateway.write_file(&path, &content, !no_create_dirs)),
        FsAction::List {
            path,
            all,
            recursive,
        } => {
            let result = gateway.list_directory(&path, all, recursive);
            match result {
                Ok(listing) if !session.json => {
                    for entry in &listing.entries {
                        let marker = if entry.kind == fs_gateway::EntryKind::Directory { "/" } else { "" };
                        println!("{:>10}  {}{marker}", entry.size, entry.path.display());
                    }
                    Ok(())
                }
                other => session.emit(other),
            }
        }
        FsAction::Mkdir { path, no_parents } => {
            session.emit(gateway.create_directory(&path, !no_parents))
        }
        FsAction::Rm { path, recursive } => session.emit(gateway.delete_path(&path, recursive)),
        FsAction::Info { path } => session.emit(gateway.path_info(&path)),
    }
}
