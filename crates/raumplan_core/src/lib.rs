pub mod convert;
pub mod csv;
pub mod params;

pub use convert::{clean_key, convert_csv_to_surql, describe_headers, parse_cell, ConvertOutput, CsvHeader};
pub use params::{derive_label, normalize_categories, NormalizeOutcome, ParamType, ParamValue, SkippedParam};
