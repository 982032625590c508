use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB store operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Client could not be built from the options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Server never answered the initial ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Attempts made.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// Periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A game commit transaction failed.
    #[error("failed to commit game `{id}`")]
    Commit {
        /// Game being committed.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The stored game moved past the version this commit was based on.
    #[error("game `{id}` was modified concurrently (expected version {expected})")]
    StaleVersion {
        /// Game being committed.
        id: Uuid,
        /// Version the stored header was expected to have.
        expected: u64,
    },
    /// A game header could not be loaded.
    #[error("failed to load game `{id}`")]
    LoadGame {
        /// Requested game.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A stored document holds values the domain cannot represent.
    #[error("stored document for `{id}` is malformed: {reason}")]
    Malformed {
        /// Identifier of the document.
        id: String,
        /// What is wrong.
        reason: String,
    },
    /// A player record could not be loaded or saved.
    #[error("failed to access player `{id}`")]
    Player {
        /// Player identifier.
        id: u64,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
