use clap::CommandFactory;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "src/cli.rs"]
mod cli;

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/cli.rs");

    // Generate manpage using clap_mangen
    let cmd = cli::Args::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buffer: Vec<u8> = Default::default();
    man.render(&mut buffer)?;

    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => return Ok(()),
    };

    // Always write to OUT_DIR
    let dest_path = out_dir.join("datask.1");
    fs::write(&dest_path, &buffer)?;

    // In release mode, also write to target/release/ for easy access in CI
    // OUT_DIR is typically target/release/build/xxx/out
    if env::var("PROFILE").unwrap_or_default() == "release" {
        if let Some(release_dir) = out_dir.ancestors().nth(3) {
            let release_manpage = release_dir.join("datask.1");
            fs::write(&release_manpage, &buffer)?;
        }
    }

    Ok(())
}
