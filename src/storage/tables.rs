use redb::TableDefinition;

/// Customers: id -> Customer (msgpack)
pub const CUSTOMERS: TableDefinition<i64, &[u8]> = TableDefinition::new("customers");

/// Name index: customer name -> id (for idempotent seeding)
pub const CUSTOMER_NAMES: TableDefinition<&str, i64> = TableDefinition::new("customer_names");

/// Token index: token -> customer id (enforces token uniqueness)
pub const CUSTOMER_TOKENS: TableDefinition<&str, i64> = TableDefinition::new("customer_tokens");

/// Upload records: id -> UploadRecord (msgpack)
pub const UPLOADS: TableDefinition<i64, &[u8]> = TableDefinition::new("uploads");

/// Upload uuid index: uuid -> upload id
pub const UPLOAD_UUIDS: TableDefinition<&str, i64> = TableDefinition::new("upload_uuids");

/// Processed records: id -> ProcessedRecord (msgpack)
pub const PROCESSED: TableDefinition<i64, &[u8]> = TableDefinition::new("processed");

/// Processed uuid index: uuid -> processed id
pub const PROCESSED_UUIDS: TableDefinition<&str, i64> = TableDefinition::new("processed_uuids");

/// One processed record per upload: upload id -> processed id
pub const PROCESSED_BY_UPLOAD: TableDefinition<i64, i64> =
    TableDefinition::new("processed_by_upload");

/// Id sequences: table name -> last assigned id
pub const SEQUENCES: TableDefinition<&str, i64> = TableDefinition::new("sequences");

pub const TABLE_NAMES: [&str; 9] = [
    "customers",
    "customer_names",
    "customer_tokens",
    "uploads",
    "upload_uuids",
    "processed",
    "processed_uuids",
    "processed_by_upload",
    "sequences",
];
