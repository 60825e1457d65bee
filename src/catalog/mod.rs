//! Signal catalog.
//!
//! The normalized location hierarchy, the devices placed in it and the
//! signals they expose. [`Catalog`] implements
//! [`SignalDirectory`](crate::core::traits::SignalDirectory) so it can feed
//! the scan engine directly; [`backfill`] and [`import_device_list`] bring
//! legacy records into it.

mod backfill;
mod directory;
mod import;
mod model;

pub use backfill::{backfill, BackfillSummary, LegacyDevice, LegacyExport, LegacyReading};
pub use directory::{Catalog, CatalogCounts};
pub use import::{
    import_device_list, metric_from_legacy_type, metric_from_tag, DeviceListEntry, ImportSummary,
};
pub use model::{level_name, Area, AreaId, Device, Division, DivisionId, Signal, Zone, ZoneId, UNASSIGNED};
