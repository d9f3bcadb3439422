use anyhow::{Context, Result, bail};
use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use strongbox::Key;
use zeroize::Zeroizing;

pub fn read_key(path: Option<&Path>) -> Result<Zeroizing<Vec<u8>>> {
    //  Key file
    //  strongbox --key-file vault.key encrypt photo.jpg photo.sbx
    if let Some(path) = path {
        let key = Zeroizing::new(
            fs::read(path).with_context(|| format!("failed to read key file {}", path.display()))?,
        );
        if key.is_empty() {
            bail!("key file {} is empty", path.display());
        }
        return Ok(key);
    }

    //  stdin (Pipeline)
    //  cat vault.key | strongbox decrypt photo.sbx photo.jpg
    if !io::stdin().is_terminal() {
        let mut key = Zeroizing::new(Vec::new());
        io::stdin().read_to_end(&mut key)?;

        if !key.is_empty() {
            return Ok(key);
        }
    }

    bail!("No key provided (use --key-file or pipe the key on stdin)")
}

pub fn write_new_key(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let key = Key::generate()?;

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).with_context(|| {
        format!("failed to create key file {} (refusing to overwrite)", path.display())
    })?;
    file.write_all(key.as_bytes())?;
    file.sync_all()?;

    Ok(())
}
