//! Frame buffer usage detection for N64 display lists

// Width/height/address juggling is all done on the console's own integer widths
#![allow(clippy::cast_lossless)]

#[macro_use]
extern crate arrayref;
#[macro_use]
extern crate log;
extern crate flexbuffers;
extern crate serde;
extern crate serde_big_array;
extern crate thiserror;

mod error;
pub mod rdp;
pub mod settings;

pub use error::{FbError, FbResult};
pub use rdp::color_image::{CiStatus, ColorImage, NUMTEXBUF};
pub use rdp::command::Command;
pub use rdp::dispatch::{Dispatch, FbOp, HostOp, Ucode};
pub use rdp::range::AddrRange;
pub use rdp::rdram::Rdram;
pub use rdp::trace::{FbEvent, LogTracer, RecordingTracer, Tracer};
pub use rdp::Rdp;
pub use settings::{FbSettings, SwapMode};

/// Savestate header
const SAVESTATE_MAGIC: [u8; 4] = *b"FBD1";

/// Detection context: detector state, the active microcode and where the decisions go
pub struct Context<T: Tracer = LogTracer> {
    rdp: Box<Rdp>,
    ucode: Ucode,
    tracer: T,
}

impl Context<LogTracer> {
    pub fn new(settings: FbSettings, ucode: Ucode) -> Context<LogTracer> {
        Context::with_tracer(settings, ucode, LogTracer)
    }
}

impl<T: Tracer> Context<T> {
    pub fn with_tracer(settings: FbSettings, ucode: Ucode, tracer: T) -> Context<T> {
        Context {
            rdp: Box::new(Rdp::new(settings)),
            ucode,
            tracer,
        }
    }

    pub fn ucode(&self) -> Ucode {
        self.ucode
    }

    /// Switch microcode, for instance when the game loads a new one mid-frame
    pub fn set_ucode(&mut self, ucode: Ucode) {
        if ucode != self.ucode {
            info!("Switching microcode {:?} -> {:?}", self.ucode, ucode);
        }
        self.ucode = ucode;
    }

    pub fn rdp(&self) -> &Rdp {
        &self.rdp
    }

    pub fn rdp_mut(&mut self) -> &mut Rdp {
        &mut self.rdp
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    pub fn tracer_mut(&mut self) -> &mut T {
        &mut self.tracer
    }

    pub fn set_vi_origin(&mut self, origin: u32) {
        self.rdp.set_vi_origin(origin);
    }

    pub fn set_scale(&mut self, scale_x: f32, scale_y: f32) {
        self.rdp.set_scale(scale_x, scale_y);
    }

    pub fn present(&mut self) {
        self.rdp.present();
    }

    /// Run a single command of the current pass
    pub fn execute(&mut self, cmd: Command, rdram: Rdram) -> Dispatch {
        self.rdp.execute(self.ucode, cmd, rdram, &mut self.tracer)
    }

    /// Run a complete detection pass over `commands`
    pub fn run_frame(&mut self, commands: &[Command], rdram: Rdram) -> FrameReport {
        let mut report = FrameReport::default();

        self.rdp.begin_frame();

        for &cmd in commands {
            match self.execute(cmd, rdram) {
                Dispatch::Handled(_) => report.handled += 1,
                Dispatch::Forward(_) => report.forwarded += 1,
                Dispatch::Unsupported => report.unsupported += 1,
                Dispatch::Halted => break,
            }
        }

        self.rdp.end_frame(&mut self.tracer);

        report.fill(&self.rdp);

        report
    }

    /// Upper bound for the savestate size
    pub fn serialize_size(&self) -> usize {
        256 * 1024
    }

    /// Serialize the detector state in `buf`, returns the number of bytes used
    pub fn serialize(&self, buf: &mut [u8]) -> FbResult<usize> {
        use serde::Serialize;

        let mut fb = flexbuffers::FlexbufferSerializer::new();

        self.rdp
            .serialize(&mut fb)
            .map_err(|e| FbError::Serialization(e.to_string()))?;

        let fbuf = fb.view();
        let total = 8 + fbuf.len();

        if total > buf.len() {
            return Err(FbError::Serialization(format!(
                "savestate is too big ({} > {})",
                total,
                buf.len()
            )));
        }

        buf[0..4].copy_from_slice(&SAVESTATE_MAGIC);
        buf[4..8].copy_from_slice(&(fbuf.len() as u32).to_le_bytes());
        buf[8..total].clone_from_slice(fbuf);

        Ok(total)
    }

    /// Restore the detector state. Settings aren't part of the savestate: the current ones are
    /// kept.
    pub fn unserialize(&mut self, buf: &[u8]) -> FbResult<()> {
        use serde::Deserialize;

        if buf.len() < 8 {
            return Err(FbError::BadSavestate("truncated header".to_string()));
        }

        if buf[0..4] != SAVESTATE_MAGIC {
            return Err(FbError::BadSavestate("bad magic".to_string()));
        }

        let len = u32::from_le_bytes(*array_ref![buf, 4, 4]) as usize;

        let Some(buf) = buf.get(8..(8 + len)) else {
            return Err(FbError::BadSavestate(format!("truncated payload ({} bytes)", len)));
        };

        let fbr = flexbuffers::Reader::get_root(buf)
            .map_err(|e| FbError::BadSavestate(e.to_string()))?;

        let mut rdp = Rdp::deserialize(fbr).map_err(|e| FbError::BadSavestate(e.to_string()))?;

        rdp.set_settings(*self.rdp.settings());
        *self.rdp = rdp;

        Ok(())
    }
}

/// Summary of a detection pass
#[derive(Clone, PartialEq, Debug, Default)]
pub struct FrameReport {
    /// Commands run by a detection handler
    pub handled: usize,
    /// Commands the host must run itself (display list flow control and such)
    pub forwarded: usize,
    /// Commands ignored because they have no handler for the current microcode
    pub unsupported: usize,
    /// Final status of every color image, in the order they were set
    pub statuses: Vec<CiStatus>,
    pub main_ci_index: usize,
    pub main_range: Option<AddrRange>,
    pub copy_ci_index: usize,
    pub motion_blur: bool,
    pub read_previous_ci: bool,
    /// The pass overflowed the color image registry
    pub halted: bool,
}

impl FrameReport {
    fn fill(&mut self, rdp: &Rdp) {
        self.statuses = rdp.color_images().iter().map(|ci| ci.status).collect();
        self.main_ci_index = rdp.main_ci_index();
        self.main_range = rdp.main_range();
        self.copy_ci_index = rdp.copy_ci_index();
        self.motion_blur = rdp.motion_blur();
        self.read_previous_ci = rdp.read_previous_ci();
        self.halted = rdp.halted();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Vec<Command> {
        vec![
            // Segment 6 at 1MB
            Command::new(0xdb06_0018, 0x10_0000),
            Command::new(0xff10_013f, 0x0600_0000),
            Command::new(0xed00_0000, 0x0050_03c0),
            Command::new(0xde00_0000, 0x0600_8000),
            Command::new(0xff10_013f, 0x20_0000),
            Command::new(0xfd10_013f, 0x0600_0000),
            Command::new(0xe700_0000, 0),
        ]
    }

    #[test]
    fn run_frame_report() {
        let mut ctx = Context::with_tracer(FbSettings::default(), Ucode::F3dex2, RecordingTracer::new());

        let report = ctx.run_frame(&frame(), Rdram::empty());

        assert_eq!(report.handled, 5);
        assert_eq!(report.forwarded, 1);
        assert_eq!(report.unsupported, 1);
        assert_eq!(report.statuses, [CiStatus::Main, CiStatus::Copy]);
        assert_eq!(report.main_range, Some(AddrRange::with_len(0x10_0000, 320 * 240 * 2)));
        assert_eq!(report.copy_ci_index, 1);
        assert!(!report.halted);
        assert!(!ctx.tracer().events.is_empty());
    }

    #[test]
    fn savestate_round_trip() {
        let mut ctx = Context::with_tracer(FbSettings::default(), Ucode::F3dex2, ());

        ctx.run_frame(&frame(), Rdram::empty());
        ctx.set_vi_origin(0x10_0280);
        ctx.present();

        let mut buf = vec![0; ctx.serialize_size()];
        let len = ctx.serialize(&mut buf).unwrap();

        assert_eq!(&buf[0..4], b"FBD1");

        let settings = FbSettings {
            fb_hires: true,
            ..Default::default()
        };
        let mut restored = Context::with_tracer(settings, Ucode::F3dex2, ());

        restored.unserialize(&buf[..len]).unwrap();

        let (a, b) = (ctx.rdp(), restored.rdp());

        assert_eq!(a.color_images(), b.color_images());
        assert_eq!(a.main_range(), b.main_range());
        assert_eq!(a.segments(), b.segments());
        assert_eq!(a.presented(), b.presented());
        assert_eq!(a.last_drawn_ci_addr(), b.last_drawn_ci_addr());
        // Settings belong to the frontend
        assert!(b.settings().fb_hires);
    }

    #[test]
    fn bad_savestates() {
        let mut ctx = Context::with_tracer(FbSettings::default(), Ucode::F3d, ());

        assert!(matches!(ctx.unserialize(b"FBD"), Err(FbError::BadSavestate(_))));
        assert!(matches!(
            ctx.unserialize(b"RSX1\0\0\0\0"),
            Err(FbError::BadSavestate(_))
        ));
        assert!(matches!(
            ctx.unserialize(b"FBD1\xff\0\0\0"),
            Err(FbError::BadSavestate(_))
        ));

        let mut small = [0u8; 16];
        assert!(matches!(ctx.serialize(&mut small), Err(FbError::Serialization(_))));
    }
}
