//! Durable per-key store of issued derivation indexes.
//!
//! Liquidation payouts must be deterministic and non-colliding across
//! concurrent runs and restarts, so every issued child address is recorded
//! on disk. The layout is one subdirectory per normalized extended public
//! key holding one empty file per issued index:
//!
//! ```text
//! <dir>/<trimmed extended pub key>/<index>_<btc address>
//! ```

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use thiserror::Error;
use tokio::sync::Mutex;

/// Errors from the derivation-index store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The extended public key was empty after trimming.
    #[error("extended public key must not be empty")]
    EmptyKey,

    /// The Bitcoin address was empty.
    #[error("bitcoin address must not be empty")]
    EmptyAddress,

    /// Filesystem access failed.
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk record of the child addresses issued per extended public key.
///
/// `save`/`get_next_index` for the same normalized key are serialized by a
/// per-key mutex held across the list-and-write; different keys proceed in
/// parallel.
#[derive(Debug)]
pub struct DerivationIndexStorage {
    dir: PathBuf,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DerivationIndexStorage {
    /// Opens (and creates, if needed) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Records that `index` of `extended_public_key` was issued for
    /// `btc_address`. Saving an already-recorded pair is not an error.
    pub async fn save(
        &self,
        extended_public_key: &str,
        index: u32,
        btc_address: &str,
    ) -> Result<(), StorageError> {
        let key = normalize_key(extended_public_key)?;
        if btc_address.trim().is_empty() {
            return Err(StorageError::EmptyAddress);
        }

        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let key_dir = self.dir.join(&key);
        tokio::fs::create_dir_all(&key_dir).await?;

        let entry = key_dir.join(format!("{index}_{btc_address}"));
        tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&entry)
            .await?;

        Ok(())
    }

    /// Returns `1 + max(index)` over all entries recorded for the key, or
    /// 0 when none exist.
    pub async fn get_next_index(&self, extended_public_key: &str) -> Result<u32, StorageError> {
        let key = normalize_key(extended_public_key)?;

        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let key_dir = self.dir.join(&key);
        let mut entries = match tokio::fs::read_dir(&key_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut max_index: Option<u32> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(index) = name
                .to_string_lossy()
                .split('_')
                .next()
                .and_then(|lead| lead.parse::<u32>().ok())
            else {
                continue;
            };
            max_index = Some(max_index.map_or(index, |max| max.max(index)));
        }

        Ok(max_index.map_or(0, |max| max + 1))
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.key_locks
            .lock()
            .await
            .entry(key.to_owned())
            .or_default()
            .clone()
    }
}

fn normalize_key(extended_public_key: &str) -> Result<String, StorageError> {
    let trimmed = extended_public_key.trim();
    if trimmed.is_empty() {
        return Err(StorageError::EmptyKey);
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const XPUB: &str = "xpub6Cg41S21VrxkW1WBTZJn95KNpHozP2Xc6AhG27ZcvZvH8XyNzunEqLdk9dxyXQUoy7ALWQFNn5K1me74aEMtS6pUgNDuCYTTMsJzCAk9sk1";
    const YPUB: &str = "ypub6ZpieGfpesfH3KqGr4zZPETidCze6RzeNMz7FLnSPgABwyQNZZmpA4tpUYFn53xtHkHXaoGviseJJcFhSn3Kw9sgzsiSnP5xEqp6Z2Yy4ZH";
    const ZPUB: &str = "zpub6rePDVHfRP14VpYiejwepBhzu45UbvqvzE3ZMdDnNykG47mZYyGTjsuq6uzQYRakSrHyix1YTXKohag4GDZLcHcLvhSAs2MQNF8VDaZuQT9";

    fn new_storage() -> (tempfile::TempDir, DerivationIndexStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = DerivationIndexStorage::new(dir.path()).unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn next_index_on_new_key_is_zero() {
        let (_dir, storage) = new_storage();
        assert_eq!(storage.get_next_index(YPUB).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_then_get_next_index() {
        struct Case {
            name: &'static str,
            inputs: &'static [(&'static str, u32)],
            expectations: &'static [(&'static str, u32)],
        }

        let cases = [
            Case {
                name: "single key, single entry",
                inputs: &[(XPUB, 5)],
                expectations: &[(XPUB, 6)],
            },
            Case {
                name: "multiple keys, single entry",
                inputs: &[(XPUB, 5), (YPUB, 48), (ZPUB, 112)],
                expectations: &[(XPUB, 6), (YPUB, 49), (ZPUB, 113)],
            },
            Case {
                name: "single key, multiple entries",
                inputs: &[(XPUB, 5), (XPUB, 172), (XPUB, 39)],
                expectations: &[(XPUB, 173)],
            },
            Case {
                name: "multiple keys, multiple entries",
                inputs: &[
                    (XPUB, 513),
                    (XPUB, 5090),
                    (XPUB, 3544),
                    (YPUB, 1692),
                    (YPUB, 223),
                    (YPUB, 8982),
                    (ZPUB, 6311),
                    (ZPUB, 6999),
                    (ZPUB, 8559),
                ],
                expectations: &[(XPUB, 5091), (YPUB, 8983), (ZPUB, 8560)],
            },
        ];

        for case in cases {
            let (_dir, storage) = new_storage();
            for (key, index) in case.inputs {
                storage.save(key, *index, "<btc-address>").await.unwrap();
            }
            for (key, expected) in case.expectations {
                let actual = storage.get_next_index(key).await.unwrap();
                assert_eq!(actual, *expected, "case [{}], key [{key}]", case.name);
            }
        }
    }

    #[tokio::test]
    async fn keys_are_trimmed() {
        let (_dir, storage) = new_storage();
        let padded = format!("    {XPUB}    ");

        storage.save(XPUB, 513, "<btc-address>").await.unwrap();
        storage.save(&padded, 5090, "<btc-address>").await.unwrap();

        assert_eq!(storage.get_next_index(XPUB).await.unwrap(), 5091);
        let more_padding = format!("       {XPUB}          ");
        assert_eq!(storage.get_next_index(&more_padding).await.unwrap(), 5091);
    }

    #[tokio::test]
    async fn duplicate_save_is_not_an_error() {
        let (_dir, storage) = new_storage();
        storage.save(XPUB, 7, "<btc-address>").await.unwrap();
        storage.save(XPUB, 7, "<btc-address>").await.unwrap();
        assert_eq!(storage.get_next_index(XPUB).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn rejects_empty_inputs() {
        let (_dir, storage) = new_storage();
        assert!(matches!(
            storage.save("   ", 0, "<btc-address>").await,
            Err(StorageError::EmptyKey)
        ));
        assert!(matches!(
            storage.save(XPUB, 0, "").await,
            Err(StorageError::EmptyAddress)
        ));
        assert!(matches!(
            storage.get_next_index("").await,
            Err(StorageError::EmptyKey)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn parallel_saves_and_reads_agree() {
        let (_dir, storage) = new_storage();
        let storage = Arc::new(storage);
        const INDEX: u32 = 831;
        const TASKS: usize = 10;

        let saves = (0..TASKS)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    storage.save(XPUB, INDEX, "<first-btc-address>").await
                })
            })
            .collect::<Vec<_>>();
        for save in saves {
            save.await.unwrap().unwrap();
        }

        let reads = (0..TASKS)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move { storage.get_next_index(XPUB).await })
            })
            .collect::<Vec<_>>();
        for read in reads {
            assert_eq!(read.await.unwrap().unwrap(), INDEX + 1);
        }
    }
}
