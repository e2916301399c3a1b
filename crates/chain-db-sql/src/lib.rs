//! Provides the SQL statements used by `chain-db` via `const` `str`s.

/// Short-hand for including an SQL string from the `sql/` subdir at compile time.
macro_rules! include_sql_str {
    ($subpath:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/", $subpath))
    };
}

/// Short-hand for declaring a `const` SQL str and presenting the SQL via the doc comment.
macro_rules! decl_const_sql_str {
    ($name:ident, $subpath:expr) => {
        /// ```sql
        #[doc = include_sql_str!($subpath)]
        /// ```
        pub const $name: &str = include_sql_str!($subpath);
    };
}

/// Table creation statements.
pub mod create {
    decl_const_sql_str!(BLOCK, "create/block.sql");
    decl_const_sql_str!(BLOCK_TRANSACTION, "create/block_transaction.sql");
    decl_const_sql_str!(COINBASE_REWARD, "create/coinbase_reward.sql");
    decl_const_sql_str!(MEGABLOCK, "create/megablock.sql");
    decl_const_sql_str!(MEGABLOCK_CHUNK, "create/megablock_chunk.sql");
    decl_const_sql_str!(NODE_REGISTRY, "create/node_registry.sql");
    decl_const_sql_str!(PUBLISHED_RECEIPT, "create/published_receipt.sql");
    decl_const_sql_str!(RECEIPT_MARKER, "create/receipt_marker.sql");
    decl_const_sql_str!(SPINE_PUBLIC_KEY, "create/spine_public_key.sql");
}

/// Statements for inserting rows into the tables.
pub mod insert {
    decl_const_sql_str!(BLOCK, "insert/block.sql");
    decl_const_sql_str!(BLOCK_TRANSACTION, "insert/block_transaction.sql");
    decl_const_sql_str!(COINBASE_REWARD, "insert/coinbase_reward.sql");
    decl_const_sql_str!(MEGABLOCK, "insert/megablock.sql");
    decl_const_sql_str!(MEGABLOCK_CHUNK, "insert/megablock_chunk.sql");
    decl_const_sql_str!(NODE_REGISTRATION, "insert/node_registration.sql");
    decl_const_sql_str!(PUBLISHED_RECEIPT, "insert/published_receipt.sql");
    decl_const_sql_str!(RECEIPT_MARKER, "insert/receipt_marker.sql");
    decl_const_sql_str!(SPINE_PUBLIC_KEY, "insert/spine_public_key.sql");
}

/// Statements for making queries.
pub mod query {
    decl_const_sql_str!(GET_BLOCK_BY_HASH, "query/get_block_by_hash.sql");
    decl_const_sql_str!(GET_BLOCK_BY_HEIGHT, "query/get_block_by_height.sql");
    decl_const_sql_str!(GET_BLOCK_BY_ID, "query/get_block_by_id.sql");
    decl_const_sql_str!(GET_BLOCK_COUNT, "query/get_block_count.sql");
    decl_const_sql_str!(GET_LAST_BLOCK, "query/get_last_block.sql");
    decl_const_sql_str!(GET_LATEST_MEGABLOCK_AT, "query/get_latest_megablock_at.sql");
    decl_const_sql_str!(
        GET_MEGABLOCK_BY_SPINE_HEIGHT,
        "query/get_megablock_by_spine_height.sql"
    );
    decl_const_sql_str!(GET_RECEIPT_MARKER, "query/get_receipt_marker.sql");
    decl_const_sql_str!(
        LIST_ACTIVE_SPINE_PUBLIC_KEYS_AT,
        "query/list_active_spine_public_keys_at.sql"
    );
    decl_const_sql_str!(
        LIST_BLOCK_SPINE_PUBLIC_KEYS,
        "query/list_block_spine_public_keys.sql"
    );
    decl_const_sql_str!(LIST_BLOCK_TRANSACTIONS, "query/list_block_transactions.sql");
    decl_const_sql_str!(LIST_BLOCKS_ABOVE_HEIGHT, "query/list_blocks_above_height.sql");
    decl_const_sql_str!(LIST_BLOCKS_FROM_HEIGHT, "query/list_blocks_from_height.sql");
    decl_const_sql_str!(LIST_COINBASE_REWARDS, "query/list_coinbase_rewards.sql");
    decl_const_sql_str!(LIST_LATEST_BLOCKS, "query/list_latest_blocks.sql");
    decl_const_sql_str!(
        LIST_LATEST_SPINE_PUBLIC_KEYS,
        "query/list_latest_spine_public_keys.sql"
    );
    decl_const_sql_str!(LIST_MEGABLOCK_CHUNKS, "query/list_megablock_chunks.sql");
    decl_const_sql_str!(LIST_PUBLISHED_RECEIPTS, "query/list_published_receipts.sql");
    decl_const_sql_str!(LIST_REGISTERED_NODES_AT, "query/list_registered_nodes_at.sql");
}

/// Statements for updating rows in place.
pub mod update {
    decl_const_sql_str!(
        CLEAR_SPINE_PUBLIC_KEY_LATEST,
        "update/clear_spine_public_key_latest.sql"
    );
    decl_const_sql_str!(
        RESTORE_SPINE_PUBLIC_KEY_LATEST,
        "update/restore_spine_public_key_latest.sql"
    );
}

/// Statements for rolling tables back to a height.
pub mod delete {
    decl_const_sql_str!(
        BLOCK_TRANSACTIONS_ABOVE_HEIGHT,
        "delete/block_transactions_above_height.sql"
    );
    decl_const_sql_str!(BLOCKS_ABOVE_HEIGHT, "delete/blocks_above_height.sql");
    decl_const_sql_str!(
        COINBASE_REWARDS_ABOVE_HEIGHT,
        "delete/coinbase_rewards_above_height.sql"
    );
    decl_const_sql_str!(
        MEGABLOCK_CHUNKS_ABOVE_HEIGHT,
        "delete/megablock_chunks_above_height.sql"
    );
    decl_const_sql_str!(MEGABLOCKS_ABOVE_HEIGHT, "delete/megablocks_above_height.sql");
    decl_const_sql_str!(
        NODE_REGISTRATIONS_ABOVE_HEIGHT,
        "delete/node_registrations_above_height.sql"
    );
    decl_const_sql_str!(
        PUBLISHED_RECEIPTS_ABOVE_HEIGHT,
        "delete/published_receipts_above_height.sql"
    );
    decl_const_sql_str!(
        SPINE_PUBLIC_KEYS_ABOVE_HEIGHT,
        "delete/spine_public_keys_above_height.sql"
    );
}

pub mod table {
    use crate::create;

    /// A table's name along with its create statement.
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
    pub struct Table {
        /// The name of the table as declared in the create statement.
        pub name: &'static str,
        /// The table's create statement.
        pub create: &'static str,
    }

    impl Table {
        const fn new(name: &'static str, create: &'static str) -> Self {
            Self { name, create }
        }
    }

    pub const BLOCK: Table = Table::new("block", create::BLOCK);
    pub const BLOCK_TRANSACTION: Table = Table::new("block_transaction", create::BLOCK_TRANSACTION);
    pub const COINBASE_REWARD: Table = Table::new("coinbase_reward", create::COINBASE_REWARD);
    pub const MEGABLOCK: Table = Table::new("megablock", create::MEGABLOCK);
    pub const MEGABLOCK_CHUNK: Table = Table::new("megablock_chunk", create::MEGABLOCK_CHUNK);
    pub const NODE_REGISTRY: Table = Table::new("node_registry", create::NODE_REGISTRY);
    pub const PUBLISHED_RECEIPT: Table = Table::new("published_receipt", create::PUBLISHED_RECEIPT);
    pub const RECEIPT_MARKER: Table = Table::new("receipt_marker", create::RECEIPT_MARKER);
    pub const SPINE_PUBLIC_KEY: Table = Table::new("spine_public_key", create::SPINE_PUBLIC_KEY);

    /// All tables in a list. Useful for initialisation and testing.
    ///
    /// `megablock` precedes `megablock_chunk`, which references it.
    pub const ALL: &[Table] = &[
        BLOCK,
        BLOCK_TRANSACTION,
        COINBASE_REWARD,
        MEGABLOCK,
        MEGABLOCK_CHUNK,
        NODE_REGISTRY,
        PUBLISHED_RECEIPT,
        RECEIPT_MARKER,
        SPINE_PUBLIC_KEY,
    ];
}
