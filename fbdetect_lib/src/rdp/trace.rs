//! Structured trace of the classifier's decisions.
//!
//! Handlers never format log messages themselves, they emit `FbEvent`s to a `Tracer`. The
//! frontend decides what to do with them.

use std::fmt;
use log::Level;
use crate::rdp::color_image::CiStatus;
use crate::rdp::command::PixelSize;

/// Why a color image got its status
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Reason {
    /// First color image of the pass not aliasing the depth buffer
    NewMain,
    /// Drawing switched back to the known main buffer
    SwitchBackToMain,
    /// Color image set on the depth buffer
    DepthAlias,
    /// Nothing known yet
    Pending,
    /// Superseded while still unknown
    Superseded,
    /// Texture fetched from a known buffer
    TextureRead,
    /// Background object copied from a known buffer
    BackgroundCopy,
    /// Depth buffer set on an existing auxiliary image
    DepthReuse,
    /// Depth buffer set on the main buffer
    MainDemoted,
    /// Took over the main role
    Promoted,
    /// Texture load without any better information
    TextureLoad,
    /// End of pass fixups
    EndOfPass,
}

/// Where an inferred height came from
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HeightSource {
    /// Square texture-sized buffer
    Square,
    Scissor,
    Rect,
    /// Main buffer height still unknown when it was first read back
    MainTextureRead,
    /// Switch back to the main buffer kept the tallest height seen
    MainHistory,
}

#[derive(Clone, PartialEq, Debug)]
pub enum FbEvent {
    Segment {
        segment: u8,
        base: u32,
    },
    ColorImage {
        index: usize,
        addr: u32,
        width: u32,
        height: u32,
        format: u8,
        size: PixelSize,
    },
    DepthImage {
        addr: u32,
        end: u32,
    },
    Status {
        index: usize,
        status: CiStatus,
        reason: Reason,
    },
    Height {
        index: usize,
        height: u32,
        source: HeightSource,
    },
    /// A texture read targets a known buffer
    TextureRead {
        index: usize,
        addr: u32,
        main_ci: u32,
    },
    BackgroundSource {
        ptr: u32,
    },
    MotionBlur {
        index: usize,
    },
    ReadPreviousCi {
        index: usize,
    },
    ScaleReset,
    ScaleRestored,
    SwapPending {
        index: usize,
    },
    BlackCandidate {
        index: usize,
    },
    /// A background descriptor couldn't be read from RDRAM
    DescriptorUnavailable {
        addr: u32,
    },
    /// Too many color images in the pass
    Overflow {
        count: usize,
    },
}

impl FbEvent {
    pub fn level(&self) -> Level {
        match self {
            FbEvent::Overflow { .. } | FbEvent::DescriptorUnavailable { .. } => Level::Warn,
            FbEvent::Status { .. }
            | FbEvent::MotionBlur { .. }
            | FbEvent::ReadPreviousCi { .. }
            | FbEvent::SwapPending { .. } => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for FbEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FbEvent::Segment { segment, base } => write!(f, "segment[{}] = {:08x}", segment, base),
            FbEvent::ColorImage {
                index,
                addr,
                width,
                height,
                format,
                size,
            } => write!(
                f,
                "color image {}: {:08x} {}x{} fmt {} size {:?}",
                index, addr, width, height, format, size
            ),
            FbEvent::DepthImage { addr, end } => write!(f, "depth image {:08x} - {:08x}", addr, end),
            FbEvent::Status {
                index,
                status,
                reason,
            } => write!(f, "frame_buffers[{}].status = {} ({:?})", index, status, reason),
            FbEvent::Height {
                index,
                height,
                source,
            } => write!(f, "frame_buffers[{}].height = {} ({:?})", index, height, source),
            FbEvent::TextureRead {
                index,
                addr,
                main_ci,
            } => write!(
                f,
                "frame_buffers[{}] reads {:08x}, main_ci {:08x}",
                index, addr, main_ci
            ),
            FbEvent::BackgroundSource { ptr } => write!(f, "main_ci_bg = {:08x}", ptr),
            FbEvent::MotionBlur { index } => write!(f, "motion blur on frame_buffers[{}]", index),
            FbEvent::ReadPreviousCi { index } => {
                write!(f, "frame_buffers[{}] reads the previous frame", index)
            }
            FbEvent::ScaleReset => f.write_str("scale reset to 1.0"),
            FbEvent::ScaleRestored => f.write_str("scale restored"),
            FbEvent::SwapPending { index } => write!(f, "swap_ci_index = {}", index),
            FbEvent::BlackCandidate { index } => write!(f, "black_ci_index = {}", index),
            FbEvent::DescriptorUnavailable { addr } => {
                write!(f, "background descriptor at {:08x} is out of RDRAM", addr)
            }
            FbEvent::Overflow { count } => write!(f, "color image overflow ({} images)", count),
        }
    }
}

pub trait Tracer {
    fn event(&mut self, event: FbEvent);
}

/// Dummy tracer that drops everything
impl Tracer for () {
    fn event(&mut self, _: FbEvent) {}
}

/// Forward events to the `log` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn event(&mut self, event: FbEvent) {
        log!(target: "fbdetect", event.level(), "{}", event);
    }
}

/// Keep every event, mostly useful for tests
#[derive(Clone, Debug, Default)]
pub struct RecordingTracer {
    pub events: Vec<FbEvent>,
}

impl RecordingTracer {
    pub fn new() -> RecordingTracer {
        RecordingTracer { events: Vec::new() }
    }

    pub fn take(&mut self) -> Vec<FbEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Tracer for RecordingTracer {
    fn event(&mut self, event: FbEvent) {
        self.events.push(event);
    }
}

#[test]
fn event_levels() {
    assert_eq!(FbEvent::Overflow { count: 92 }.level(), Level::Warn);
    assert_eq!(FbEvent::ScaleReset.level(), Level::Trace);
    assert_eq!(
        FbEvent::Status {
            index: 0,
            status: CiStatus::Main,
            reason: Reason::NewMain
        }
        .to_string(),
        "frame_buffers[0].status = main (NewMain)"
    );
}
