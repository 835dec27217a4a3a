use std::io::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canopyfs_core::{read_all, CaseMode, DirExt, IterMode, VfsFile, VfsRoot};
use canopyfs_disk::{mount_disk_root, mount_external_path, DiskLoader};
use canopyfs_zip::ZipLoader;

#[derive(Parser)]
#[command(name = "canopyfs")]
#[command(about = "Inspect a merged virtual filesystem built from directories and archives")]
#[command(version)]
struct Cli {
    /// Directory to scan and attach at the namespace root
    #[arg(long, default_value = ".")]
    root: String,

    /// Extra mounts, SRC:DEST (repeatable); SRC must resolve in the tree
    #[arg(long = "mount", value_name = "SRC:DEST")]
    mounts: Vec<String>,

    /// External OS paths to mount, PATH:DEST (repeatable)
    #[arg(long = "external", value_name = "PATH:DEST")]
    externals: Vec<String>,

    /// Archives to open and mount at their own paths (repeatable)
    #[arg(long = "archive", value_name = "PATH")]
    archives: Vec<String>,

    /// Fold name case on lookups
    #[arg(long)]
    ignore_case: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the files and subdirectories at a path
    Ls {
        /// Path in the merged namespace (the root if omitted)
        path: Option<String>,
    },

    /// Print a file's content to stdout
    Cat {
        path: String,
    },

    /// Dump the whole merged tree with backend labels
    Tree,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canopyfs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let vfs = build_vfs(&cli)?;

    match &cli.command {
        Commands::Ls { path } => ls(&vfs, path.as_deref().unwrap_or("")),
        Commands::Cat { path } => cat(&vfs, path),
        Commands::Tree => {
            let mut out = String::new();
            vfs.dump_tree(&mut out)?;
            print!("{out}");
            Ok(())
        }
    }
}

fn build_vfs(cli: &Cli) -> Result<VfsRoot> {
    let case = if cli.ignore_case { CaseMode::Insensitive } else { CaseMode::Sensitive };
    let mut vfs = VfsRoot::new(case);
    vfs.add_loader(Arc::new(DiskLoader::new(case)));
    vfs.add_archive_loader(Arc::new(ZipLoader::new(case)));

    mount_disk_root(&mut vfs, &cli.root)
        .with_context(|| format!("scanning root '{}'", cli.root))?;
    info!(root = %cli.root, "root attached");

    for spec in &cli.externals {
        let (path, dest) = split_spec(spec)?;
        mount_external_path(&mut vfs, path, dest, true)
            .with_context(|| format!("mounting external path '{path}'"))?;
    }
    for spec in &cli.mounts {
        let (src, dest) = split_spec(spec)?;
        vfs.mount(src, dest, true)
            .with_context(|| format!("mounting '{src}' at '{dest}'"))?;
    }
    for path in &cli.archives {
        vfs.add_archive(path, None)
            .with_context(|| format!("opening archive '{path}'"))?;
    }
    Ok(vfs)
}

fn split_spec(spec: &str) -> Result<(&str, &str)> {
    match spec.split_once(':') {
        Some((src, dest)) => Ok((src, dest)),
        None => bail!("expected SRC:DEST, got '{spec}'"),
    }
}

fn ls(vfs: &VfsRoot, path: &str) -> Result<()> {
    let Some(dir) = vfs.get_dir(path, false) else {
        bail!("no such directory: '{path}'");
    };
    for (name, _) in dir.dirs(IterMode::Snapshot) {
        println!("{name}/");
    }
    for (name, file) in dir.files(IterMode::Snapshot) {
        match file.size() {
            Some(n) => println!("{name}  {n}"),
            None => println!("{name}  ?"),
        }
    }
    Ok(())
}

fn cat(vfs: &VfsRoot, path: &str) -> Result<()> {
    let Some(file) = vfs.get_file(path) else {
        bail!("no such file: '{path}'");
    };
    let Some(content) = read_all(file.as_ref()) else {
        bail!("could not read '{path}' ({} backend)", file.backend());
    };
    std::io::stdout().write_all(&content)?;
    Ok(())
}
