use crate::cobot_driver::{CobotConnector, CobotDriver, DriverError, Result};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, PoisonError},
};
use tokio::sync::{Mutex, MutexGuard};

pub type SharedDriver = Arc<Mutex<Box<dyn CobotDriver>>>;

struct PoolEntry {
    driver: SharedDriver,
    baud_rate: u32,
    holders: usize,
}

/// One serial port drives one physical arm.
///
/// Components asking for the same port share a single vendor session. The
/// session is stopped and closed once its last holder releases it.
pub struct ConnectionPool {
    connector: Arc<dyn CobotConnector>,
    entries: StdMutex<HashMap<String, PoolEntry>>,
}

/// Handle on a pooled session, give it back with [`ConnectionPool::release`]
pub struct CobotConnection {
    serial_path: String,
    driver: SharedDriver,
}

impl CobotConnection {
    pub fn serial_path(&self) -> &str {
        &self.serial_path
    }

    pub async fn lock(&self) -> MutexGuard<'_, Box<dyn CobotDriver>> {
        self.driver.lock().await
    }
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn CobotConnector>) -> Arc<ConnectionPool> {
        Arc::new(ConnectionPool {
            connector,
            entries: StdMutex::new(HashMap::new()),
        })
    }

    pub fn acquire(&self, serial_path: &str, baud_rate: u32) -> Result<CobotConnection> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(serial_path) {
            if entry.baud_rate != baud_rate {
                return Err(DriverError::BaudRateMismatch {
                    path: serial_path.to_owned(),
                    open: entry.baud_rate,
                    requested: baud_rate,
                });
            }
            entry.holders += 1;
            tracing::debug!("Reusing connection to {}, {} holders", serial_path, entry.holders);
            return Ok(CobotConnection {
                serial_path: serial_path.to_owned(),
                driver: Arc::clone(&entry.driver),
            });
        }

        let driver: SharedDriver = Arc::new(Mutex::new(self.connector.connect(serial_path, baud_rate)?));
        tracing::info!("Connected to myCobot on {} at {} baud", serial_path, baud_rate);
        entries.insert(
            serial_path.to_owned(),
            PoolEntry {
                driver: Arc::clone(&driver),
                baud_rate,
                holders: 1,
            },
        );
        Ok(CobotConnection {
            serial_path: serial_path.to_owned(),
            driver,
        })
    }

    pub async fn release(&self, connection: CobotConnection) -> Result<()> {
        let last = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.get_mut(&connection.serial_path) {
                Some(entry) if Arc::ptr_eq(&entry.driver, &connection.driver) => {
                    entry.holders -= 1;
                    if entry.holders == 0 {
                        entries.remove(&connection.serial_path);
                        true
                    } else {
                        false
                    }
                }
                // session was already torn down
                _ => false,
            }
        };
        if !last {
            return Ok(());
        }

        tracing::info!("Closing connection to {}", connection.serial_path);
        let mut driver = connection.driver.lock().await;
        let stopped = driver.stop().await;
        driver.close().await?;
        stopped
    }

    pub fn holders(&self, serial_path: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(serial_path)
            .map(|entry| entry.holders)
            .unwrap_or(0)
    }
}
