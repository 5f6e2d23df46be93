#![forbid(unsafe_code)]
use bsdelta::{Bsdiff, DeltaError, Format, SuffixIndex};
use std::fs;
use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::str::FromStr;

#[macro_use]
extern crate clap;

fn main() {
    let matches = clap_app!(
        bsddiff =>
        (version: "0.1.0")
        (about: "binary delta compressor with classic and endsley containers")
        (@arg FORMAT:
            -f +takes_value
            "patch container format, classic (default) or endsley")
        (@arg INDEX:
            -x +takes_value
            "reuse a persisted suffix index of the source")
        (@arg SOURCE:
            +required
            "source file")
        (@arg TARGET:
            +required
            "target file")
        (@arg PATCH:
            +required
            "patch file"))
    .get_matches();

    let format_expr = matches.value_of("FORMAT").unwrap_or("classic");
    let index_name = matches.value_of("INDEX");
    let source_name = matches.value_of("SOURCE").unwrap();
    let target_name = matches.value_of("TARGET").unwrap();
    let patch_name = matches.value_of("PATCH").unwrap();

    match BsdiffApp::new(format_expr, index_name, source_name, target_name, patch_name) {
        Ok(app) => {
            if let Err(e) = app.execute() {
                eprintln!("error: {}", e);
            }
        }
        Err(e) => eprintln!("error: {}", e),
    }
}

struct BsdiffApp {
    source: Vec<u8>,
    target: Vec<u8>,
    index: Option<SuffixIndex>,
    patch: Box<dyn Write>,
    format: Format,
}

impl BsdiffApp {
    pub fn new(
        format_expr: &str,
        index_name: Option<&str>,
        source_name: &str,
        target_name: &str,
        patch_name: &str,
    ) -> bsdelta::Result<Self> {
        let format = Format::from_str(format_expr)?;

        if source_name == "-" && target_name == "-" {
            return Err(DeltaError::InvalidArgument(
                "source and target could not be stdin at the same time".to_string(),
            ));
        }

        let mut source;
        if source_name == "-" {
            source = Vec::new();
            io::stdin().read_to_end(&mut source)?;
        } else {
            source = fs::read(source_name)?;
        }
        source.shrink_to_fit();

        let mut target;
        if target_name == "-" {
            target = Vec::new();
            io::stdin().read_to_end(&mut target)?;
        } else {
            target = fs::read(target_name)?;
        }
        target.shrink_to_fit();

        let index = match index_name {
            Some(name) => Some(SuffixIndex::read_from(File::open(name)?, source.len())?),
            None => None,
        };

        let patch: Box<dyn Write>;
        if patch_name == "-" {
            patch = Box::new(io::stdout());
        } else {
            patch = Box::new(File::create(patch_name)?);
        }

        Ok(BsdiffApp {
            source,
            target,
            index,
            patch,
            format,
        })
    }

    pub fn execute(self) -> bsdelta::Result<()> {
        let diff = Bsdiff::new(&self.source[..], &self.target[..]).format(self.format);
        match self.index.as_ref() {
            Some(index) => diff.index(index).compare(self.patch)?,
            None => diff.compare(self.patch)?,
        };
        Ok(())
    }
}
