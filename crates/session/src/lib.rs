pub mod backend;
pub mod diarize;
pub mod error;
pub mod id;
pub mod pipeline;
pub mod session;
pub mod speakers;
pub mod state;
pub mod statements;
pub mod textmerge;
pub mod timestamps;

pub use backend::{BoxFuture, ConversationService, ServiceError};
pub use error::Error;
pub use id::{IdGenerator, SequentialIdGen, UuidIdGen};
pub use pipeline::{AudioSource, BufferedAudioSource, RecordingPipeline};
pub use session::Session;
pub use speakers::{SpeakerProfile, SpeakerRegistry, PALETTE};
pub use state::{DiarizedTranscript, SessionSnapshot, SessionState};
