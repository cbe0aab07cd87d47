use std::{env, fs::File, process};

use cask_class_file::{AttributeLocation, ClassFile, ClassFileError};

fn main() {
    pretty_env_logger::init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: validate <path/to/Class.class>");
        process::exit(2);
    };

    let class_file = match File::open(&path)
        .map_err(ClassFileError::from)
        .and_then(ClassFile::parse)
    {
        Ok(class_file) => class_file,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }
    };

    let name = class_file.class_name().unwrap_or("<unnamed>");
    let invalid = class_file.invalid_attributes();
    if invalid.is_empty() {
        println!("{}: all attributes valid", name);
        return;
    }

    for (location, error) in &invalid {
        let owner = match location {
            AttributeLocation::Class => "class".to_owned(),
            AttributeLocation::Field(i) => format!("field #{}", i),
            AttributeLocation::Method(i) => format!("method #{}", i),
            AttributeLocation::Code(i) => format!("code of method #{}", i),
        };
        println!("{} ({}): {}", name, owner, error);
    }
    process::exit(1);
}
