pub mod accumulator;
pub mod file;
pub mod frame;
pub mod level;
pub mod wav;

pub use accumulator::{FrameAccumulator, Window};
pub use file::{AudioFile, FileSource};
pub use frame::{encode_s16le, AudioFormat, AudioFrame, PcmFormat};
pub use level::{AmplitudeGate, AmplitudeLevel, AmplitudeThreshold};
pub use wav::{ArchiveEntry, ArchiveRequest, UtteranceArchive};
