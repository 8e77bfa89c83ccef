//! I/O layer: normalized product metadata, the adapter seams every mission
//! reader implements, the JSON product-document reader, candidate discovery,
//! pair tables, configuration and result writers.
pub mod adapter;
pub use adapter::{AdapterError, DatasetProvider, MetadataAdapter};

pub mod config;
pub use config::{ColocConfig, ConfigError};

pub mod conversions;
pub mod dataset;
pub use dataset::{AttrValue, Dataset, Geolocation};

pub mod document;
pub use document::{DocumentAdapter, ProductDocument};

pub mod finder;
pub use finder::{CandidateFinder, FinderError, ProductSource, TemplateFinder};

pub mod metadata;
pub use metadata::{ProductMetadata, TimeWindow};

pub mod missions;

pub mod table;
pub use table::{GranuleResolver, PairRow, PairTable, TableError, TableLayout, UniqueBy};

pub mod writers;
pub use writers::{ListingWriter, WriterError};
