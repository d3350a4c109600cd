pub mod builder;
pub mod csv;
pub mod normalize;
pub mod rules;
pub mod schema;

pub use builder::{build_records, BuildError, BuildOutput};
pub use csv::{read_csv, read_csv_file, CsvError, RawTable};
pub use normalize::{parse_amount, parse_date, AmountError, AmountOptions, DateOptions};
pub use rules::{CategoryEngine, CategoryRule, PatternKind, SignFilter, UNCATEGORIZED};
pub use schema::{infer_roles, InferenceOptions, SchemaError};
