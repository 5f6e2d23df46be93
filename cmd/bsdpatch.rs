#![forbid(unsafe_code)]
use bsdelta::{Bspatch, Format};
use std::fs;
use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::str::FromStr;

#[macro_use]
extern crate clap;

fn main() {
    let matches = clap_app!(
        bsdpatch =>
        (version: "0.1.0")
        (about: "applies binary delta patches in classic and endsley containers")
        (@arg FORMAT:
            -f +takes_value
            "patch container format, classic (default) or endsley")
        (@arg BSIZE:
            -b +takes_value
            "buffer size")
        (@arg SOURCE:
            +required
            "source file")
        (@arg PATCH:
            +required
            "patch file")
        (@arg TARGET:
            +required
            "target file"))
    .get_matches();

    let format_expr = matches.value_of("FORMAT").unwrap_or("classic");
    let bsize_expr = matches.value_of("BSIZE").unwrap_or("16384");
    let source_name = matches.value_of("SOURCE").unwrap();
    let patch_name = matches.value_of("PATCH").unwrap();
    let target_name = matches.value_of("TARGET").unwrap();

    match BspatchApp::new(format_expr, bsize_expr, source_name, patch_name, target_name) {
        Ok(app) => {
            if let Err(e) = app.execute() {
                eprintln!("error: {}", e);
            }
        }
        Err(e) => eprintln!("error: {}", e),
    }
}

struct BspatchApp {
    source: Vec<u8>,
    patch: Vec<u8>,
    target: Box<dyn Write>,
    format: Format,
    bsize: usize,
}

impl BspatchApp {
    pub fn new(
        format_expr: &str,
        bsize_expr: &str,
        source_name: &str,
        patch_name: &str,
        target_name: &str,
    ) -> bsdelta::Result<Self> {
        let format = Format::from_str(format_expr)?;
        let bsize = usize::from_str(bsize_expr)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let source;
        if source_name == "-" {
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data)?;
            source = data;
        } else {
            source = fs::read(source_name)?;
        }

        let patch = fs::read(patch_name)?;

        let target: Box<dyn Write>;
        if target_name == "-" {
            target = Box::new(io::stdout());
        } else {
            target = Box::new(File::create(target_name)?);
        }

        Ok(BspatchApp {
            source,
            patch,
            target,
            format,
            bsize,
        })
    }

    pub fn execute(self) -> bsdelta::Result<()> {
        Bspatch::new(&self.patch[..], self.format)?
            .buffer_size(self.bsize)
            .apply(&self.source[..], self.target)?;
        Ok(())
    }
}
