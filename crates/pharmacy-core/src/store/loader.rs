//! Loading and saving the whole inventory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::codec::{
    decode_analogue, decode_operation, decode_pharmacy, decode_product, decode_stock,
    encode_analogue, encode_operation, encode_pharmacy, encode_product, encode_stock,
};
use super::{OpenMode, ReadOutcome, RecordReader, RecordResult, RecordWriter, StoreResult};
use crate::config::StoreConfig;
use crate::manager::PharmacyManager;
use crate::models::InventoryOperation;

/// Per-file load statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub file: String,
    /// The file did not exist and was treated as empty
    pub missing: bool,
    pub loaded: usize,
    /// Malformed or rejected lines
    pub skipped: usize,
    /// Well-formed lines referring to unknown products or branches
    pub ignored: usize,
}

impl LoadReport {
    fn new(path: &Path) -> Self {
        Self {
            file: path.display().to_string(),
            ..Self::default()
        }
    }
}

/// Everything [`TextStore::load_all`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub medicines: LoadReport,
    pub analogues: LoadReport,
    pub pharmacies: LoadReport,
    pub stock: LoadReport,
    pub operations: LoadReport,
    /// Write-offs created for products found expired at load time
    pub expired_write_offs: usize,
}

/// Outcome of applying one decoded line to the manager.
enum Applied {
    Loaded,
    Ignored,
}

/// Reads and writes the record files named by a [`StoreConfig`].
///
/// Each call opens, uses and closes its files; no handle outlives a call.
#[derive(Debug, Clone)]
pub struct TextStore {
    config: StoreConfig,
}

impl TextStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load every file into `manager`, in dependency order.
    ///
    /// Products already expired are archived instead of catalogued and get a
    /// completed `expired` write-off unless the operations file has one.
    pub fn load_all(&self, manager: &mut PharmacyManager) -> StoreResult<LoadSummary> {
        let medicines = self.load_medicines(manager)?;
        let analogues = self.load_analogues(manager)?;
        let pharmacies = self.load_pharmacies(manager)?;
        let mut expired_held = BTreeMap::new();
        let stock = self.read_stock(manager, &mut expired_held)?;
        let operations = self.load_operations(manager)?;

        let mut expired_write_offs = 0;
        let archived: Vec<_> = manager.archived_products().cloned().collect();
        for product in archived {
            let held = expired_held.get(product.id()).copied().unwrap_or(0);
            if manager.record_expiry(product, held)?.is_some() {
                expired_write_offs += 1;
            }
        }
        if expired_write_offs > 0 {
            info!(count = expired_write_offs, "expired products written off at load");
        }

        Ok(LoadSummary {
            medicines,
            analogues,
            pharmacies,
            stock,
            operations,
            expired_write_offs,
        })
    }

    /// Load products. Expired ones go to the archive.
    pub fn load_medicines(&self, manager: &mut PharmacyManager) -> StoreResult<LoadReport> {
        self.load_file(&self.config.medicines_path(), |line| {
            let product = Rc::new(decode_product(line)?);
            if product.is_expired() {
                debug!(id = product.id(), "archiving expired product");
                manager.archive_product(product)?;
            } else {
                manager.catalog_product(product)?;
            }
            Ok(Applied::Loaded)
        })
    }

    /// Load explicit analogue links. A missing file means no links.
    ///
    /// Links touching an archived product are ignored.
    pub fn load_analogues(&self, manager: &mut PharmacyManager) -> StoreResult<LoadReport> {
        self.load_file(&self.config.analogues_path(), |line| {
            let (medicine_id, analogue_id) = decode_analogue(line)?;
            let archived = |id: &str| {
                !manager.catalog().contains(id) && manager.resolve_product(id).is_some()
            };
            if archived(&medicine_id) || archived(&analogue_id) {
                debug!(
                    medicine = %medicine_id,
                    analogue = %analogue_id,
                    "link to archived product ignored"
                );
                return Ok(Applied::Ignored);
            }
            manager.link_analogue(&medicine_id, &analogue_id)?;
            Ok(Applied::Loaded)
        })
    }

    pub fn load_pharmacies(&self, manager: &mut PharmacyManager) -> StoreResult<LoadReport> {
        self.load_file(&self.config.pharmacies_path(), |line| {
            manager.add_pharmacy(decode_pharmacy(line)?)?;
            Ok(Applied::Loaded)
        })
    }

    /// Load stock levels. Records for unknown products or branches are ignored.
    pub fn load_stock(&self, manager: &mut PharmacyManager) -> StoreResult<LoadReport> {
        self.read_stock(manager, &mut BTreeMap::new())
    }

    /// Load operations, falling back to the legacy file name.
    pub fn load_operations(&self, manager: &mut PharmacyManager) -> StoreResult<LoadReport> {
        let mut path = self.config.operations_path();
        if !path.exists() {
            let legacy = self.config.legacy_operations_path();
            if legacy.exists() {
                debug!(path = %legacy.display(), "reading legacy operations file");
                path = legacy;
            }
        }
        self.load_file(&path, |line| {
            let operation = decode_operation(line, |id| manager.resolve_product(id))?;
            manager.add_operation(operation)?;
            Ok(Applied::Loaded)
        })
    }

    /// Stock for archived products is not put on shelves; its quantity is
    /// collected in `expired_held` for the expiry write-off.
    fn read_stock(
        &self,
        manager: &mut PharmacyManager,
        expired_held: &mut BTreeMap<String, u32>,
    ) -> StoreResult<LoadReport> {
        self.load_file(&self.config.stock_path(), |line| {
            let record = decode_stock(line)?;
            let Some(product) = manager.catalog().find(&record.product_id).cloned() else {
                if manager.resolve_product(&record.product_id).is_some() {
                    let held = expired_held.entry(record.product_id).or_insert(0);
                    *held = held.saturating_add(record.quantity);
                } else {
                    debug!(product = %record.product_id, "stock for unknown product ignored");
                }
                return Ok(Applied::Ignored);
            };
            let Ok(pharmacy) = manager.get_pharmacy_mut(record.pharmacy_id) else {
                debug!(pharmacy = record.pharmacy_id, "stock for unknown pharmacy ignored");
                return Ok(Applied::Ignored);
            };
            pharmacy.add_stock_on(product, record.quantity, record.received_on)?;
            Ok(Applied::Loaded)
        })
    }

    fn load_file(
        &self,
        path: &Path,
        mut apply: impl FnMut(&str) -> RecordResult<Applied>,
    ) -> StoreResult<LoadReport> {
        let mut report = LoadReport::new(path);
        let mut reader = match RecordReader::open(path) {
            Ok(reader) => reader,
            Err(e) if e.is_missing_file() => {
                info!(path = %path.display(), "file not found, starting empty");
                report.missing = true;
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        loop {
            match reader.read_with(&mut apply)? {
                ReadOutcome::Record(Applied::Loaded) => report.loaded += 1,
                ReadOutcome::Record(Applied::Ignored) => report.ignored += 1,
                ReadOutcome::Malformed(err) => {
                    warn!(%err, "skipping record");
                    report.skipped += 1;
                }
                ReadOutcome::EndOfInput => break,
            }
        }

        debug!(
            file = %report.file,
            loaded = report.loaded,
            skipped = report.skipped,
            ignored = report.ignored,
            "file loaded"
        );
        Ok(report)
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// Rewrite every file from `manager`. Existing content is replaced.
    pub fn save_all(&self, manager: &PharmacyManager) -> StoreResult<()> {
        fs::create_dir_all(&self.config.data_dir)?;

        let products = manager.products().chain(manager.archived_products());
        self.write_file(&self.config.medicines_path(), products.map(|p| encode_product(p)))?;

        let links = manager.products().flat_map(|p| {
            p.analogues()
                .into_iter()
                .map(|analogue| encode_analogue(p.id(), &analogue))
                .collect::<Vec<_>>()
        });
        self.write_file(&self.config.analogues_path(), links)?;

        let pharmacies = manager.pharmacies().map(encode_pharmacy);
        self.write_file(&self.config.pharmacies_path(), pharmacies)?;

        let stock = manager.pharmacies().flat_map(|p| {
            p.storage()
                .entries()
                .map(move |entry| encode_stock(p.id(), entry))
        });
        self.write_file(&self.config.stock_path(), stock)?;

        let operations = manager.operations().iter().map(encode_operation);
        self.write_file(&self.config.operations_path(), operations)?;

        info!(dir = %self.config.data_dir.display(), "inventory saved");
        Ok(())
    }

    /// Append one operation to the operations file.
    ///
    /// When only the legacy file exists, its lines are first copied into the
    /// current file so the history read at load time is not left behind.
    pub fn append_operation(&self, operation: &InventoryOperation) -> StoreResult<()> {
        fs::create_dir_all(&self.config.data_dir)?;
        let path = self.config.operations_path();
        let legacy = self.config.legacy_operations_path();
        if !path.exists() && legacy.exists() {
            let mut history = fs::read(&legacy)?;
            if history.last().is_some_and(|b| *b != b'\n') {
                history.push(b'\n');
            }
            fs::write(&path, history)?;
            info!(from = %legacy.display(), to = %path.display(), "operations file migrated");
        }
        let mut writer = RecordWriter::open(&path, OpenMode::Append)?;
        writer.write_line(&encode_operation(operation))?;
        writer.finish()?;
        debug!(id = operation.id(), "operation appended");
        Ok(())
    }

    fn write_file(&self, path: &Path, lines: impl Iterator<Item = String>) -> StoreResult<()> {
        let mut writer = RecordWriter::open(path, OpenMode::Truncate)?;
        for line in lines {
            writer.write_line(&line)?;
        }
        let written = writer.finish()?;
        debug!(path = %path.display(), written, "file written");
        Ok(())
    }
}
