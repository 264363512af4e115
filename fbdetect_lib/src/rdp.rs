//! Frame buffer usage detection.
//!
//! Before a frame is rendered its display list is walked once with the lightweight handlers in
//! `fb`. They watch every color image (render target) the game sets and guess what each one is
//! for: the buffer that ends up on screen, a copy of it used for post processing, an auxiliary
//! target, or the depth buffer reinterpreted as color. Nothing in the command stream says so
//! explicitly: the guess comes entirely from address aliasing, dimensions and command ordering.

#[macro_use]
mod debug;

pub mod color_image;
pub mod command;
pub mod depth;
pub mod dispatch;
mod fb;
pub mod range;
pub mod rdram;
pub mod scissor;
pub mod segment;
pub mod trace;


use crate::settings::{FbSettings, SwapMode};
use self::color_image::{CiStatus, ColorImage, ColorImageRegistry};
use self::command::Command;
use self::depth::DepthImage;
use self::dispatch::{Dispatch, DispatchTable, Op, Ucode};
use self::range::AddrRange;
use self::rdram::Rdram;
use self::scissor::Scissor;
use self::segment::SegmentTable;
use self::trace::{FbEvent, Reason, Tracer};

/// Detector state. Lives as long as the emulated console, per-pass fields are reset by
/// `begin_frame`.
#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct Rdp {
    pub(crate) settings: FbSettings,
    pub(crate) segments: SegmentTable,
    pub(crate) frame_buffers: ColorImageRegistry,
    pub(crate) depth: DepthImage,
    pub(crate) scissor: Scissor,
    /// Address of the main buffer, 0 while unknown
    pub(crate) main_ci: u32,
    /// End of the main buffer
    pub(crate) main_ci_end: u32,
    /// Image drawn as the main buffer's background, used to tell motion blur from a plain
    /// background copy
    pub(crate) main_ci_bg: u32,
    /// First texture address read while drawing into the current main record
    pub(crate) main_ci_last_tex_addr: Option<u32>,
    pub(crate) main_ci_index: usize,
    /// Last image found to copy the main buffer
    pub(crate) copy_ci_index: usize,
    /// Hi-res workaround candidate
    pub(crate) black_ci_index: Option<usize>,
    /// Image the display should swap to
    pub(crate) swap_ci_index: Option<usize>,
    /// Current color image address
    pub(crate) cimg: u32,
    /// Previous color image address
    pub(crate) ocimg: u32,
    /// Extent of the last main buffer, used to size depth buffers
    pub(crate) ci_width: u32,
    pub(crate) ci_height: u32,
    pub(crate) scale_x: f32,
    pub(crate) scale_y: f32,
    pub(crate) scale_x_bak: f32,
    pub(crate) scale_y_bak: f32,
    pub(crate) motion_blur: bool,
    pub(crate) read_previous_ci: bool,
    /// `read_previous_ci` of the previous pass
    pub(crate) previous_ci_was_read: bool,
    /// Set when the pass must stop, cleared by `begin_frame`
    pub(crate) halt: bool,
    /// Display swap allowed, re-armed on every presentation
    pub(crate) swap_ok: bool,
    /// VI origin register when the last frame was presented
    pub(crate) vi_org_reg: u32,
    /// Current VI origin register
    pub(crate) vi_origin: u32,
    /// Main buffers of the last two passes, most recent first
    pub(crate) maincimg: [ColorImage; 2],
    pub(crate) last_drawn_ci_addr: u32,
    /// Number of color images of the last complete pass
    pub(crate) num_of_ci: usize,
    saved_cimg: u32,
    saved_zimg: u32,
}

impl Rdp {
    pub fn new(settings: FbSettings) -> Rdp {
        Rdp {
            settings,
            segments: SegmentTable::new(),
            frame_buffers: ColorImageRegistry::new(),
            depth: DepthImage::default(),
            scissor: Scissor::default(),
            main_ci: 0,
            main_ci_end: 0,
            main_ci_bg: 0,
            main_ci_last_tex_addr: None,
            main_ci_index: 0,
            copy_ci_index: 0,
            black_ci_index: None,
            swap_ci_index: None,
            cimg: 0,
            ocimg: 0,
            ci_width: 0,
            ci_height: 0,
            scale_x: 1.,
            scale_y: 1.,
            scale_x_bak: 1.,
            scale_y_bak: 1.,
            motion_blur: false,
            read_previous_ci: false,
            previous_ci_was_read: false,
            halt: false,
            swap_ok: true,
            vi_org_reg: 0,
            vi_origin: 0,
            maincimg: [ColorImage::default(); 2],
            last_drawn_ci_addr: 0,
            num_of_ci: 0,
            saved_cimg: 0,
            saved_zimg: 0,
        }
    }

    pub fn settings(&self) -> &FbSettings {
        &self.settings
    }

    /// Settings take effect at the next command
    pub fn set_settings(&mut self, settings: FbSettings) {
        self.settings = settings;
    }

    /// Reset the per-pass state before walking a new display list. Segments, the scissor and the
    /// presentation history survive.
    pub fn begin_frame(&mut self) {
        self.saved_cimg = self.cimg;
        self.saved_zimg = self.depth.zimg;

        self.main_ci = 0;
        self.main_ci_end = 0;
        self.main_ci_bg = 0;
        self.main_ci_last_tex_addr = None;
        self.main_ci_index = 0;
        self.copy_ci_index = 0;
        self.black_ci_index = None;
        self.swap_ci_index = None;
        self.frame_buffers.clear();
        self.depth.zimg_end = self.depth.zimg;
        self.depth.tmpzimg = 0;
        self.motion_blur = false;
        self.previous_ci_was_read = self.read_previous_ci;
        self.read_previous_ci = false;
        self.swap_ok = true;
        self.halt = false;
        self.scale_x_bak = self.scale_x;
        self.scale_y_bak = self.scale_y;
    }

    /// Run one command through the dispatch table of `ucode`
    pub fn execute(
        &mut self,
        ucode: Ucode,
        cmd: Command,
        rdram: Rdram,
        tracer: &mut dyn Tracer,
    ) -> Dispatch {
        if self.halt {
            return Dispatch::Halted;
        }

        fb_debug!("{:?} {}", ucode, cmd);

        match DispatchTable::get().lookup(ucode, cmd.opcode()) {
            Some(Op::Fb(op)) => {
                fb::run(op, self, rdram, tracer, cmd);
                Dispatch::Handled(op)
            }
            Some(Op::Host(op)) => Dispatch::Forward(op),
            None => Dispatch::Unsupported,
        }
    }

    /// Fix up the classification once the whole display list has been walked
    pub fn end_frame(&mut self, tracer: &mut dyn Tracer) {
        self.swap_ok = true;

        if self.halt {
            // The pass overflowed, don't trust anything it found
            self.cimg = self.saved_cimg;
            self.depth.zimg = self.saved_zimg;
            self.num_of_ci = self.frame_buffers.len();
            self.restore_scale(tracer);
            return;
        }

        let Some(last) = self.frame_buffers.current_index() else {
            self.num_of_ci = 0;
            return;
        };

        if let Some(black) = self.black_ci_index {
            if black > 0 && black < self.copy_ci_index {
                self.set_status(black, CiStatus::Main, Reason::EndOfPass, tracer);
            }
        }

        if self.frame_buffers[last].status == CiStatus::Unknown {
            let status = if last > 0 {
                CiStatus::Aux
            } else {
                CiStatus::Main
            };

            self.set_status(last, status, Reason::EndOfPass, tracer);
        }

        let main_width = self.frame_buffers[self.main_ci_index].width;
        let last_ci = self.frame_buffers[last];

        if last_ci.status == CiStatus::Aux && main_width < 320 && last_ci.width > main_width {
            // The game renders to a small buffer first and the real frame comes last
            for index in 0..=last {
                let ci = self.frame_buffers[index];

                if ci.status == CiStatus::Main {
                    self.set_status(index, CiStatus::Aux, Reason::EndOfPass, tracer);
                } else if ci.addr == last_ci.addr {
                    self.set_status(index, CiStatus::Main, Reason::Promoted, tracer);
                }
            }

            self.main_ci_index = last;
        }

        if self.frame_buffers.iter().all(|ci| ci.status == CiStatus::Zimg) {
            for index in 0..=last {
                self.set_status(index, CiStatus::Main, Reason::EndOfPass, tracer);
            }
        }

        if self.read_previous_ci
            && self.previous_ci_was_read
            && !(self.settings.fb_hires && self.copy_ci_index != 0)
        {
            self.motion_blur = true;
            tracer.event(FbEvent::MotionBlur { index: last });
        }

        let copy_status = self.frame_buffers.get(self.copy_ci_index).map(|ci| ci.status);

        if self.motion_blur || self.settings.fb_hires || copy_status == Some(CiStatus::AuxCopy) {
            self.restore_scale(tracer);
        }

        let main = self.frame_buffers[self.main_ci_index];

        self.maincimg[1] = self.maincimg[0];
        self.maincimg[0] = main;
        self.ci_width = main.width;
        self.ci_height = main.height;
        self.num_of_ci = last + 1;
    }

    /// Called by the host when it presents a frame
    pub fn present(&mut self) {
        let swapped = self
            .swap_ci_index
            .and_then(|index| self.frame_buffers.get(index))
            .map_or(self.maincimg[0].addr, |ci| ci.addr);

        self.last_drawn_ci_addr = match self.settings.swap_mode {
            SwapMode::OnViOriginChange => swapped,
            _ => self.maincimg[0].addr,
        };

        self.vi_org_reg = self.vi_origin;
        self.swap_ok = true;
    }

    /// Latest value of the VI origin register
    pub fn set_vi_origin(&mut self, origin: u32) {
        self.vi_origin = origin;
    }

    /// Scale factors from texture coordinates to the host frame buffer, as set up by the renderer
    pub fn set_scale(&mut self, scale_x: f32, scale_y: f32) {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
    }

    pub fn scale(&self) -> (f32, f32) {
        (self.scale_x, self.scale_y)
    }

    pub fn color_images(&self) -> &[ColorImage] {
        self.frame_buffers.as_slice()
    }

    pub fn ci_count(&self) -> usize {
        self.frame_buffers.len()
    }

    /// Address range of the main buffer, if one was found
    pub fn main_range(&self) -> Option<AddrRange> {
        if self.main_ci == 0 {
            None
        } else {
            Some(AddrRange::new(self.main_ci, self.main_ci_end))
        }
    }

    pub fn main_ci_index(&self) -> usize {
        self.main_ci_index
    }

    pub fn main_ci_bg(&self) -> u32 {
        self.main_ci_bg
    }

    pub fn main_ci_last_tex_addr(&self) -> Option<u32> {
        self.main_ci_last_tex_addr
    }

    pub fn copy_ci_index(&self) -> usize {
        self.copy_ci_index
    }

    pub fn black_ci_index(&self) -> Option<usize> {
        self.black_ci_index
    }

    pub fn swap_ci_index(&self) -> Option<usize> {
        self.swap_ci_index
    }

    pub fn depth(&self) -> &DepthImage {
        &self.depth
    }

    pub fn scissor(&self) -> &Scissor {
        &self.scissor
    }

    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    pub fn cimg(&self) -> u32 {
        self.cimg
    }

    pub fn ocimg(&self) -> u32 {
        self.ocimg
    }

    pub fn motion_blur(&self) -> bool {
        self.motion_blur
    }

    pub fn read_previous_ci(&self) -> bool {
        self.read_previous_ci
    }

    pub fn halted(&self) -> bool {
        self.halt
    }

    /// Main buffers presented by the last two passes, most recent first
    pub fn presented(&self) -> &[ColorImage; 2] {
        &self.maincimg
    }

    pub fn last_drawn_ci_addr(&self) -> u32 {
        self.last_drawn_ci_addr
    }

    pub fn num_of_ci(&self) -> usize {
        self.num_of_ci
    }

    pub(crate) fn set_status(
        &mut self,
        index: usize,
        status: CiStatus,
        reason: Reason,
        tracer: &mut dyn Tracer,
    ) {
        self.frame_buffers[index].status = status;
        tracer.event(FbEvent::Status {
            index,
            status,
            reason,
        });
    }

    pub(crate) fn reset_scale(&mut self, tracer: &mut dyn Tracer) {
        self.scale_x = 1.;
        self.scale_y = 1.;
        tracer.event(FbEvent::ScaleReset);
    }

    pub(crate) fn restore_scale(&mut self, tracer: &mut dyn Tracer) {
        self.scale_x = self.scale_x_bak;
        self.scale_y = self.scale_y_bak;
        tracer.event(FbEvent::ScaleRestored);
    }
}
