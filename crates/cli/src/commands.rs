use std::io::{self, BufRead, Write};

use site_admin_core::archive::SiteArchiver;

pub async fn backup(archiver: &SiteArchiver) -> anyhow::Result<()> {
    let info = archiver.create_backup().await?;
    println!("{}", info.name);
    Ok(())
}

pub async fn list(archiver: &SiteArchiver) -> anyhow::Result<()> {
    let backups = archiver.list_backups().await?;
    if backups.is_empty() {
        eprintln!("No backups in bucket '{}'", archiver.settings().bucket);
    }
    for backup in backups {
        println!("{}\t{}", backup.created_at.to_rfc3339(), backup.name);
    }
    Ok(())
}

pub async fn restore(archiver: &SiteArchiver, name: &str, yes: bool) -> anyhow::Result<()> {
    let token = archiver.request_confirmation(name).await?;
    if !yes {
        eprintln!("{}", token.description());
        if !confirm(&mut io::stdin().lock(), &mut io::stderr())? {
            anyhow::bail!("restore of {name} cancelled");
        }
    }

    let report = archiver.restore_backup(token).await?;
    for partition in &report.partitions {
        println!("{}\t{} records", partition.name, partition.records);
    }
    Ok(())
}

/// Ask for an explicit `yes`. Anything else declines.
fn confirm(input: &mut impl BufRead, prompt: &mut impl Write) -> io::Result<bool> {
    write!(prompt, "Type 'yes' to restore: ")?;
    prompt.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_confirms() {
        let mut sink = Vec::new();
        assert!(confirm(&mut "yes\n".as_bytes(), &mut sink).unwrap());
        assert!(confirm(&mut "YES".as_bytes(), &mut sink).unwrap());
        assert!(!confirm(&mut "y\n".as_bytes(), &mut sink).unwrap());
        assert!(!confirm(&mut "".as_bytes(), &mut sink).unwrap());
        assert!(String::from_utf8(sink).unwrap().contains("Type 'yes'"));
    }
}
