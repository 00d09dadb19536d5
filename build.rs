//! Embeds the AWS region certificate bundle.
//!
//! Every `certs/aws/<region>.pem` file becomes an entry of the generated
//! `AWS_REGION_CERTS` table, included by `src/trust.rs`.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const AWS_CERTS_DIR: &str = "certs/aws";

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed={}", AWS_CERTS_DIR);

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").map_err(io::Error::other)?);
    let out_dir = PathBuf::from(env::var("OUT_DIR").map_err(io::Error::other)?);

    let entries = collect_region_certs(&manifest_dir.join(AWS_CERTS_DIR))?;

    let mut generated = String::from("pub(crate) static AWS_REGION_CERTS: &[(&str, &str)] = &[\n");
    for (region, path) in entries {
        println!("cargo:rerun-if-changed={}", path.display());
        generated.push_str(&format!(
            "    ({:?}, include_str!({:?})),\n",
            region,
            path.display().to_string()
        ));
    }
    generated.push_str("];\n");

    fs::write(out_dir.join("aws_region_certs.rs"), generated)
}

fn collect_region_certs(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("pem") {
            continue;
        }
        if let Some(region) = path.file_stem().and_then(|s| s.to_str()) {
            entries.push((region.to_string(), path.clone()));
        }
    }
    entries.sort();
    Ok(entries)
}
