//! Decoder adapter: access units in, decoded frames out

use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use super::{DecoderFactory, DecoderInput, VideoDecoder};
use crate::protocol::HandshakeInfo;
use crate::{AccessUnit, DecodedFrame, DecoderError};

/// Drives one decoder session for a stream.
///
/// Config packets are held back and prepended to the next media packet, which
/// is how parameter sets and sequence headers reach the backend. A config packet
/// that changes the configuration after pictures were decoded flushes the current
/// backend (its frames are returned, not dropped) and replaces it with a fresh one.
pub struct DecoderAdapter {
    factory: Arc<dyn DecoderFactory>,
    info: HandshakeInfo,
    backend: Box<dyn VideoDecoder>,

    /// Last configuration received
    config: Option<Vec<u8>>,
    /// `config` still has to be sent along with the next media packet
    config_pending: bool,
    /// Media was decoded since the current configuration took effect
    decoded_since_config: bool,

    skipped: u64,
    flushed: bool,
}

impl DecoderAdapter {
    /// Open a decoder session for the negotiated stream
    pub fn new(factory: Arc<dyn DecoderFactory>, info: &HandshakeInfo) -> Result<Self, DecoderError> {
        let backend = factory.create(info)?;
        debug!(codec = %info.codec, width = info.width, height = info.height, "Decoder session created");

        Ok(Self {
            factory,
            info: info.clone(),
            backend,
            config: None,
            config_pending: false,
            decoded_since_config: false,
            skipped: 0,
            flushed: false,
        })
    }

    /// Submit one access unit and collect the frames it releases.
    ///
    /// A corrupt payload is logged and skipped (`Ok` with no frames). Other
    /// errors are fatal for the session.
    pub fn submit(&mut self, unit: AccessUnit) -> Result<Vec<DecodedFrame>, DecoderError> {
        if unit.codec != self.info.codec {
            error!(expected = %self.info.codec, got = %unit.codec, "Access unit codec does not match session");
            return Err(DecoderError::UnsupportedCodec(unit.codec));
        }

        if unit.is_config {
            return self.apply_config(unit.payload);
        }

        let data = match (&self.config, self.config_pending) {
            (Some(config), true) => {
                let mut merged = Vec::with_capacity(config.len() + unit.payload.len());
                merged.extend_from_slice(config);
                merged.extend_from_slice(&unit.payload);
                merged
            }
            _ => unit.payload,
        };

        let input = DecoderInput {
            codec: unit.codec,
            data: &data,
            pts: unit.pts,
            is_key_frame: unit.is_key_frame,
        };

        match self.backend.decode(input) {
            Ok(frames) => {
                trace!(pts = ?unit.pts, frames = frames.len(), "Decoded access unit");
                self.config_pending = false;
                self.decoded_since_config = true;
                Ok(frames)
            }
            Err(DecoderError::CorruptPayload { details }) => {
                self.skipped += 1;
                warn!(pts = ?unit.pts, skipped = self.skipped, "Skipping corrupt access unit: {}", details);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn apply_config(&mut self, config: Vec<u8>) -> Result<Vec<DecodedFrame>, DecoderError> {
        let changed = self.config.as_deref() != Some(config.as_slice());

        if !changed {
            debug!(len = config.len(), "Repeated decoder configuration");
            return Ok(Vec::new());
        }

        let mut frames = Vec::new();
        if self.decoded_since_config {
            // the current backend keeps its frames if no replacement can be opened
            let replacement = self.factory.create(&self.info)?;
            let mut previous = std::mem::replace(&mut self.backend, replacement);
            frames = drain(previous.as_mut())?;
            self.decoded_since_config = false;
            info!(flushed = frames.len(), "Decoder reconfigured");
        }

        debug!(len = config.len(), "Decoder configuration received");
        self.config = Some(config);
        self.config_pending = true;
        Ok(frames)
    }

    /// Drain trailing frames at end of stream. Only the first call reaches the backend.
    pub fn flush(&mut self) -> Result<Vec<DecodedFrame>, DecoderError> {
        if self.flushed {
            return Ok(Vec::new());
        }
        self.flushed = true;

        let frames = drain(self.backend.as_mut())?;
        debug!(frames = frames.len(), "Decoder flushed");
        Ok(frames)
    }

    /// Access units skipped because of corrupt payloads
    pub fn skipped_units(&self) -> u64 {
        self.skipped
    }

    /// Stream parameters this adapter decodes
    pub fn info(&self) -> &HandshakeInfo {
        &self.info
    }
}

fn drain(backend: &mut dyn VideoDecoder) -> Result<Vec<DecodedFrame>, DecoderError> {
    backend.flush().map_err(|e| match e {
        DecoderError::FlushFailed { .. } => e,
        other => DecoderError::flush_failed(other.to_string()),
    })
}

impl std::fmt::Debug for DecoderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderAdapter")
            .field("codec", &self.info.codec)
            .field("config_len", &self.config.as_ref().map(Vec::len))
            .field("config_pending", &self.config_pending)
            .field("skipped", &self.skipped)
            .finish()
    }
}
