#![forbid(unsafe_code)]
use bsdelta::SuffixIndex;
use std::fs;
use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::io::BufWriter;

#[macro_use]
extern crate clap;

fn main() {
    let matches = clap_app!(
        bsdindex =>
        (version: "0.1.0")
        (about: "persists the suffix index of a file for reuse across diffs")
        (@arg SOURCE:
            +required
            "source file")
        (@arg INDEX:
            +required
            "index file"))
    .get_matches();

    let source_name = matches.value_of("SOURCE").unwrap();
    let index_name = matches.value_of("INDEX").unwrap();

    if let Err(e) = run(source_name, index_name) {
        eprintln!("error: {}", e);
    }
}

fn run(source_name: &str, index_name: &str) -> bsdelta::Result<()> {
    let source;
    if source_name == "-" {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        source = data;
    } else {
        source = fs::read(source_name)?;
    }

    let index = SuffixIndex::build(&source);

    let mut out: Box<dyn Write>;
    if index_name == "-" {
        out = Box::new(io::stdout());
    } else {
        out = Box::new(BufWriter::new(File::create(index_name)?));
    }
    index.write_to(&mut out)?;
    out.flush()?;
    Ok(())
}
