//! Append-only transfer audit log.
//!
//! One comma-separated line per completed transfer. Nothing in the
//! process reads it back; it is a durability and observability sink
//! only.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use drip_common::Balance;

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await
    }
}

/// Build one audit record: ISO-8601 timestamp (seconds precision),
/// network, address, amount+denom, tx hash, resulting balances.
pub fn format_record(
    timestamp: DateTime<Utc>,
    network_id: &str,
    address: &str,
    amount: u128,
    denom: &str,
    tx_hash: &str,
    balances: &[Balance],
) -> String {
    let snapshot = balances
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{},{},{},{}{},{},{}",
        timestamp.format("%Y-%m-%dT%H:%M:%S"),
        network_id,
        address,
        amount,
        denom,
        tx_hash,
        snapshot
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_record() {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap();
        let balances = vec![Balance::new("adym", "900"), Balance::new("uatom", "50")];
        let line = format_record(
            timestamp,
            "dymension_100-1",
            "dym1abc",
            100,
            "adym",
            "CAFEBABE",
            &balances,
        );
        assert_eq!(
            line,
            "2024-05-01T12:30:45,dymension_100-1,dym1abc,100adym,CAFEBABE,900adym 50uatom"
        );
    }

    #[tokio::test]
    async fn test_append_is_line_oriented() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.csv");
        let log = AuditLog::new(&path);

        log.append("a,b,c").await.unwrap();
        log.append("d,e,f").await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "a,b,c\nd,e,f\n");
    }
}
