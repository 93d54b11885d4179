use clap::{Parser, Subcommand};

/// `Quillcraft` - drafting assistant that learns how you like to write.
#[derive(Parser, Debug)]
#[command(name = "quillcraft")]
#[command(version)]
#[command(
    about = "Draft, review and revise writing with a human in the loop.",
    long_about = None
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a writing task and run it to the first review
    Start {
        /// What to write
        request: String,

        /// User whose stored memories guide the draft
        #[arg(short, long)]
        user: Option<String>,

        /// Reuse an explicit session id instead of generating one
        #[arg(long)]
        session: Option<String>,
    },

    /// Resume a session with a raw JSON decision
    Resume {
        session: String,

        /// e.g. '{"action": "revise", "feedback": "shorter"}'
        decision: String,

        /// Only resume if this suspension is still pending
        #[arg(long)]
        suspension_id: Option<String>,
    },

    /// Approve the draft under review
    Approve { session: String },

    /// Ask for a revision of the draft under review
    Revise {
        session: String,

        /// Free-text guidance; may be omitted
        #[arg(short, long, default_value = "")]
        feedback: String,
    },

    /// Reject the draft under review and end the task
    Reject { session: String },

    /// Confirm suggested memories. Without arguments the current
    /// suggestions are confirmed as they stand.
    Confirm {
        session: String,
        memories: Vec<String>,
    },

    /// Replace one suggested memory before confirming
    EditSuggestion {
        session: String,
        index: usize,
        text: String,
    },

    /// Remove one suggested memory before confirming
    DeleteSuggestion { session: String, index: usize },

    /// Print the latest checkpoint of a session
    Show { session: String },

    /// List stored sessions
    Sessions,

    /// List users known to the memory store
    Users,

    /// Print the stored memories of a user
    Memories { user: String },

    /// Show configuration and storage status
    Status,
}
