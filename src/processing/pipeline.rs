//! Decode → filter → re-encode, one input at a time.

use tracing::{debug, trace};

use crate::codec::{
    CodecEngine, Coefficients, CriticalParameters, DecodeSession, EncodeOptions, EncodeSession,
    EngineFault, Marker,
};
use crate::core::{OptimizeOutput, OptimizedImage, OutputTarget, StripFlags};
use crate::processing::markers::{filter_markers, is_exif, retention_for};
use crate::processing::{ErrorManager, MemoryDestination, ThumbnailStripping};
use crate::utils::{OptimizeError, OptimizeResult};

/// Progress of a pipeline run. Each run moves strictly forward and ends in
/// `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    HeaderParsed,
    CoefficientsRead,
    EncodeOpened,
    CoefficientsWritten,
    MarkersWritten,
    Completed,
    Failed,
}

/// An encode session that finishes at most once.
struct Compressor<'s> {
    session: Box<dyn EncodeSession<'s> + 's>,
    coefficients_written: bool,
    finished: bool,
}

impl<'s> Compressor<'s> {
    fn new(session: Box<dyn EncodeSession<'s> + 's>) -> Self {
        Self {
            session,
            coefficients_written: false,
            finished: false,
        }
    }

    fn write_coefficients(&mut self, coefficients: &'s Coefficients) -> Result<(), EngineFault> {
        self.session.write_coefficients(coefficients)?;
        self.coefficients_written = true;
        Ok(())
    }

    fn write_marker(&mut self, code: u8, payload: &[u8]) -> Result<(), EngineFault> {
        self.session.write_marker(code, payload)
    }

    /// No-op if never started or already finished.
    fn finish(&mut self) -> Result<(), EngineFault> {
        if !self.coefficients_written || self.finished {
            return Ok(());
        }
        self.finished = true;
        self.session.finish()
    }
}

/// Lossless recompression of a single JPEG stream.
pub struct RecompressionPipeline<'e> {
    engine: &'e dyn CodecEngine,
    stripper: Option<&'e dyn ThumbnailStripping>,
    errors: ErrorManager,
    state: PipelineState,
    failed_after: Option<PipelineState>,
}

impl<'e> RecompressionPipeline<'e> {
    pub fn new(engine: &'e dyn CodecEngine, stripper: Option<&'e dyn ThumbnailStripping>) -> Self {
        Self {
            engine,
            stripper,
            errors: ErrorManager::new(),
            state: PipelineState::Start,
            failed_after: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Last step reached before the run failed.
    pub fn failed_after(&self) -> Option<PipelineState> {
        self.failed_after
    }

    /// Runs the whole pipeline. On failure no partial output is returned and
    /// a caller-supplied target buffer is dropped.
    pub fn run(
        &mut self,
        input: &[u8],
        flags: StripFlags,
        target: Option<OutputTarget>,
    ) -> OptimizeResult<OptimizeOutput> {
        debug!("Recompressing {} bytes (flags: {:#x})", input.len(), flags.bits());
        let result = self.execute(input, flags, target);
        match &result {
            Ok(output) => {
                self.advance(PipelineState::Completed);
                debug!("Recompressed {} -> {} bytes", input.len(), output.len());
            }
            Err(e) => {
                debug!("Recompression failed in state {:?}: {}", self.state, e);
                self.failed_after = Some(self.state);
                self.state = PipelineState::Failed;
            }
        }
        result
    }

    fn advance(&mut self, state: PipelineState) {
        trace!("Pipeline {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn execute(
        &mut self,
        input: &[u8],
        flags: StripFlags,
        target: Option<OutputTarget>,
    ) -> OptimizeResult<OptimizeOutput> {
        let mut decoder = self
            .errors
            .check(self.engine.open_decoder(input, retention_for(flags)))?;
        self.errors.check(decoder.read_header())?;
        if decoder.header().is_none() {
            return Err(OptimizeError::InvalidImage(EngineFault::NoImage));
        }
        self.advance(PipelineState::HeaderParsed);

        self.errors.check(decoder.read_coefficients())?;
        let params = self.errors.check(decoder.critical_parameters())?;
        let decoder: &dyn DecodeSession = &*decoder;
        let coefficients = decoder
            .coefficients()
            .ok_or(OptimizeError::InvalidImage(EngineFault::NoImage))?;
        self.advance(PipelineState::CoefficientsRead);

        let markers = filter_markers(decoder.markers(), flags);
        let replacement = match self.stripper {
            Some(stripper) if flags.rewrites_thumbnail() => stripper.replacement_exif(input),
            _ => None,
        };
        trace!(
            "Retaining {} markers, thumbnail replacement: {}",
            markers.len(),
            replacement.is_some()
        );

        match target {
            None => {
                let mut dest = MemoryDestination::growable(input.len());
                self.encode(&mut dest, params, coefficients, &markers, replacement)?;
                let data = dest
                    .into_vec()
                    .ok_or_else(|| OptimizeError::diagnostic("Growable output lost its buffer"))?;
                Ok(OptimizeOutput::Buffer(OptimizedImage::new(data)))
            }
            Some(OutputTarget::Buffer(mut target)) => {
                let len = self.encode_fixed(&mut target, params, coefficients, &markers, replacement)?;
                Ok(OptimizeOutput::Written { target, len })
            }
            Some(OutputTarget::Limit(limit)) => {
                let mut buf = Vec::new();
                buf.try_reserve_exact(limit)
                    .map_err(|_| OptimizeError::AllocationFailure)?;
                buf.resize(limit, 0);
                let len = self.encode_fixed(&mut buf, params, coefficients, &markers, replacement)?;
                buf.truncate(len);
                Ok(OptimizeOutput::Buffer(OptimizedImage::new(buf)))
            }
        }
    }

    fn encode_fixed(
        &mut self,
        buf: &mut [u8],
        params: CriticalParameters,
        coefficients: &Coefficients,
        markers: &[&Marker],
        replacement: Option<Vec<u8>>,
    ) -> OptimizeResult<usize> {
        let mut dest = MemoryDestination::fixed(buf);
        self.encode(&mut dest, params, coefficients, markers, replacement)?;
        dest.written_len()
            .ok_or_else(|| OptimizeError::diagnostic("Output was never terminated"))
    }

    fn encode<'s>(
        &mut self,
        dest: &'s mut MemoryDestination<'_>,
        params: CriticalParameters,
        coefficients: &'s Coefficients,
        markers: &[&Marker],
        mut replacement: Option<Vec<u8>>,
    ) -> OptimizeResult<()> {
        self.errors.bind_destination(dest.kind());
        let session = self.errors.check(self.engine.open_encoder(
            params,
            EncodeOptions::OPTIMIZED_SEQUENTIAL,
            dest,
        ))?;
        let mut compressor = Compressor::new(session);
        self.advance(PipelineState::EncodeOpened);

        self.errors.check(compressor.write_coefficients(coefficients))?;
        self.advance(PipelineState::CoefficientsWritten);

        for marker in markers {
            let substitute = if is_exif(marker) { replacement.take() } else { None };
            let payload = substitute.as_deref().unwrap_or(&marker.payload);
            self.errors.check(compressor.write_marker(marker.code, payload))?;
        }
        self.advance(PipelineState::MarkersWritten);

        self.errors.check(compressor.finish())
    }
}
