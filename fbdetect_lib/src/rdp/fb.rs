//! Frame buffer detection handlers.
//!
//! Every handler gets the full command and works on the current color image (the last one set),
//! except `set_color_image` which finalizes the current image while creating the next one.

use crate::rdp::Rdp;
use crate::rdp::color_image::{CiStatus, ColorImage, NUMTEXBUF};
use crate::rdp::command::{
    BgDescriptor, Command, CoordWord, ImageDesc, MoveWordUc0, MoveWordUc2, G_IM_FMT_RGBA,
    G_MW_SEGMENT,
};
use crate::rdp::dispatch::FbOp;
use crate::rdp::range::AddrRange;
use crate::rdp::rdram::Rdram;
use crate::rdp::segment::BMASK;
use crate::rdp::trace::{FbEvent, HeightSource, Reason, Tracer};
use crate::settings::SwapMode;

type Handler = fn(&mut Rdp, Rdram, &mut dyn Tracer, Command);

impl FbOp {
    fn handler(self) -> Handler {
        match self {
            FbOp::MoveWordUc0 => uc0_moveword,
            FbOp::MoveWordUc2 => uc2_moveword,
            FbOp::BgCopy => bg_copy,
            FbOp::SetScissor => set_scissor,
            FbOp::Rect => rect,
            FbOp::SetTextureImage => set_texture_image,
            FbOp::LoadTexture => load_texture,
            FbOp::SetDepthImage => set_depth_image,
            FbOp::SetColorImage => set_color_image,
        }
    }
}

pub(super) fn run(op: FbOp, rdp: &mut Rdp, rdram: Rdram, tracer: &mut dyn Tracer, cmd: Command) {
    (op.handler())(rdp, rdram, tracer, cmd)
}

fn main_range(rdp: &Rdp) -> AddrRange {
    AddrRange::new(rdp.main_ci, rdp.main_ci_end)
}

/// Update the height of an image, keeping the main buffer's end in sync
fn set_height(
    rdp: &mut Rdp,
    tracer: &mut dyn Tracer,
    index: usize,
    height: u32,
    source: HeightSource,
) {
    rdp.frame_buffers[index].height = height;
    tracer.event(FbEvent::Height {
        index,
        height,
        source,
    });

    let ci = rdp.frame_buffers[index];

    if index == rdp.main_ci_index && ci.status == CiStatus::Main && ci.addr == rdp.main_ci {
        rdp.main_ci_end = ci.range().end();
    }
}

fn set_segment(rdp: &mut Rdp, tracer: &mut dyn Tracer, segment: u8, base: u32) {
    rdp.segments.set(segment, base);
    tracer.event(FbEvent::Segment { segment, base });
}

fn uc0_moveword(rdp: &mut Rdp, _: Rdram, tracer: &mut dyn Tracer, cmd: Command) {
    let mw = MoveWordUc0(cmd.w0);

    if mw.index() == G_MW_SEGMENT {
        set_segment(rdp, tracer, mw.segment(), cmd.w1);
    }
}

fn uc2_moveword(rdp: &mut Rdp, _: Rdram, tracer: &mut dyn Tracer, cmd: Command) {
    let mw = MoveWordUc2(cmd.w0);

    if mw.index() == G_MW_SEGMENT {
        set_segment(rdp, tracer, mw.segment(), cmd.w1);
    }
}

fn set_color_image(rdp: &mut Rdp, _: Rdram, tracer: &mut dyn Tracer, cmd: Command) {
    if rdp.frame_buffers.is_full() {
        warn!("More than {} color images in a single pass, halting", NUMTEXBUF);
        rdp.halt = true;
        tracer.event(FbEvent::Overflow {
            count: NUMTEXBUF + 1,
        });
        return;
    }

    let desc = ImageDesc(cmd.w0);
    let addr = rdp.segments.resolve(cmd.w1) & BMASK;
    let index = rdp.frame_buffers.len();

    rdp.ocimg = rdp.cimg;
    rdp.cimg = addr;

    let width = desc.width();
    let mut ci = ColorImage {
        addr,
        width,
        height: 0,
        format: desc.format(),
        size: desc.pixel_size(),
        status: CiStatus::Unknown,
        changed: true,
    };

    match width {
        // Textures used as frame buffers
        32 | 16 => {
            ci.height = width;
            tracer.event(FbEvent::Height {
                index,
                height: width,
                source: HeightSource::Square,
            });
        }
        _ if index > 0 => ci.height = rdp.scissor.lr_y,
        _ => (),
    }

    tracer.event(FbEvent::ColorImage {
        index,
        addr,
        width,
        height: ci.height,
        format: ci.format,
        size: ci.size,
    });

    let reason = if rdp.depth.aliases(addr) {
        ci.status = CiStatus::Zimg;

        if !rdp.depth.extent_known() {
            let len = width * rdp.scissor.lr_y * 2;
            rdp.depth.zimg_end = rdp.depth.zimg.saturating_add(len);
        }

        Reason::DepthAlias
    } else if rdp.main_ci == 0 {
        rdp.main_ci = addr;
        rdp.main_ci_end = ci.range().end();
        rdp.main_ci_index = index;
        rdp.main_ci_last_tex_addr = None;
        ci.status = CiStatus::Main;

        Reason::NewMain
    } else if addr == rdp.main_ci {
        let main_height = rdp.frame_buffers[rdp.main_ci_index].height;

        if main_height > ci.height {
            ci.height = main_height;
            tracer.event(FbEvent::Height {
                index,
                height: main_height,
                source: HeightSource::MainHistory,
            });
        }

        rdp.main_ci_index = index;
        rdp.main_ci_end = ci.range().end();
        rdp.main_ci_last_tex_addr = None;
        ci.status = CiStatus::Main;

        Reason::SwitchBackToMain
    } else {
        Reason::Pending
    };

    tracer.event(FbEvent::Status {
        index,
        status: ci.status,
        reason,
    });

    // Nothing told us what the previous image was for
    if let Some(prev) = index.checked_sub(1) {
        if rdp.frame_buffers[prev].status == CiStatus::Unknown {
            if rdp.settings.fb_hires && !rdp.settings.pm {
                rdp.frame_buffers[prev].changed = false;
                rdp.set_status(prev, CiStatus::Aux, Reason::Superseded, tracer);
            } else {
                rdp.set_status(prev, CiStatus::Useless, Reason::Superseded, tracer);
            }
        }
    }

    if ci.status == CiStatus::Main {
        let vi_swap_ok = !(rdp.settings.swap_mode == SwapMode::OnViOriginChange
            && rdp.vi_org_reg == rdp.vi_origin);

        if rdp.maincimg[0].addr != addr && rdp.swap_ok && vi_swap_ok {
            rdp.swap_ok = false;
            rdp.swap_ci_index = Some(index);
            tracer.event(FbEvent::SwapPending { index });
        }
    }

    rdp.frame_buffers.push(ci);
}

fn set_depth_image(rdp: &mut Rdp, _: Rdram, tracer: &mut dyn Tracer, cmd: Command) {
    let zimg = rdp.segments.resolve(cmd.w1) & BMASK;

    rdp.depth.set(zimg, rdp.ci_width * rdp.ci_height * 2);
    tracer.event(FbEvent::DepthImage {
        addr: zimg,
        end: rdp.depth.zimg_end,
    });

    // Strange, but it happens
    if rdp.main_ci != 0 && zimg == rdp.main_ci {
        let main = rdp.main_ci_index;
        let next = main + 1;

        rdp.set_status(main, CiStatus::Unknown, Reason::MainDemoted, tracer);

        if next < rdp.frame_buffers.len() {
            rdp.set_status(main, CiStatus::Zimg, Reason::MainDemoted, tracer);
            rdp.set_status(next, CiStatus::Main, Reason::Promoted, tracer);

            let ci = rdp.frame_buffers[next];

            rdp.main_ci_index = next;
            rdp.main_ci = ci.addr;
            rdp.main_ci_end = ci.range().end();
        } else {
            rdp.main_ci = 0;
        }
    }

    rdp.depth
        .reclassify_aliases(&mut rdp.frame_buffers, tracer);
}

fn set_texture_image(rdp: &mut Rdp, _: Rdram, tracer: &mut dyn Tracer, cmd: Command) {
    if rdp.main_ci == 0 {
        return;
    }

    let Some(cur) = rdp.frame_buffers.current_index() else {
        return;
    };

    if rdp.frame_buffers[cur].status.is_resolved() {
        return;
    }

    let desc = ImageDesc(cmd.w0);

    // 4 and 8bpp textures can't alias a frame buffer
    if desc.pixel_size().bits() >= 16 {
        let addr = rdp.segments.resolve(cmd.w1) & BMASK;

        if desc.format() == G_IM_FMT_RGBA {
            classify_texture_read(rdp, tracer, cur, addr);
        } else if rdp.settings.fb_hires
            && rdp.frame_buffers[cur].status == CiStatus::Main
            && main_range(rdp).contains(addr)
        {
            rdp.copy_ci_index = cur;
            rdp.black_ci_index = Some(cur);
            tracer.event(FbEvent::BlackCandidate { index: cur });
            rdp.set_status(cur, CiStatus::CopySelf, Reason::TextureRead, tracer);
        }
    }

    if rdp.frame_buffers[cur].status == CiStatus::Unknown {
        rdp.set_status(cur, CiStatus::Aux, Reason::TextureRead, tracer);
    }
}

fn classify_texture_read(rdp: &mut Rdp, tracer: &mut dyn Tracer, cur: usize, addr: u32) {
    let ci = rdp.frame_buffers[cur];

    tracer.event(FbEvent::TextureRead {
        index: cur,
        addr,
        main_ci: rdp.main_ci,
    });

    if ci.status == CiStatus::Main {
        if rdp.main_ci_last_tex_addr.is_none() {
            rdp.main_ci_last_tex_addr = Some(addr);
        }

        if ci.height == 0 {
            let height = rdp.scissor.lr_y;
            set_height(rdp, tracer, cur, height, HeightSource::MainTextureRead);
        }
    }

    if main_range(rdp).contains(addr) {
        if ci.status == CiStatus::Main {
            rdp.copy_ci_index = cur;
            rdp.set_status(cur, CiStatus::CopySelf, Reason::TextureRead, tracer);
            rdp.restore_scale(tracer);
            return;
        }

        let main_width = rdp.frame_buffers[rdp.main_ci_index].width;

        if ci.width == main_width {
            rdp.copy_ci_index = cur;
            rdp.set_status(cur, CiStatus::Copy, Reason::TextureRead, tracer);

            // The main buffer was itself drawn from this image: the copy feeds back into the
            // next frame
            let feedback = rdp
                .main_ci_last_tex_addr
                .is_some_and(|tex_addr| ci.range().contains(tex_addr));

            if feedback {
                rdp.motion_blur = true;
                tracer.event(FbEvent::MotionBlur { index: cur });
            } else {
                rdp.reset_scale(tracer);
            }
        } else if !rdp.settings.fb_ignore_aux_copy && ci.width < main_width {
            rdp.copy_ci_index = cur;
            rdp.set_status(cur, CiStatus::AuxCopy, Reason::TextureRead, tracer);
            rdp.reset_scale(tracer);
        } else {
            rdp.set_status(cur, CiStatus::Aux, Reason::TextureRead, tracer);
        }
    } else if ci.status != CiStatus::Main && rdp.depth.range().contains(addr) {
        rdp.set_status(cur, CiStatus::Zcopy, Reason::TextureRead, tracer);
    } else if reads_previous_frame(rdp, addr) {
        if ci.status != CiStatus::Main {
            rdp.set_status(cur, CiStatus::OldCopy, Reason::TextureRead, tracer);
        }

        rdp.read_previous_ci = true;
        tracer.event(FbEvent::ReadPreviousCi { index: cur });
    }
}

/// True if `addr` is within the last presented frame or the last drawn main buffer
fn reads_previous_frame(rdp: &Rdp, addr: u32) -> bool {
    let presented = rdp.maincimg[0].range_16bpp();
    let last_drawn = AddrRange::with_len(rdp.last_drawn_ci_addr, presented.len());

    presented.contains(addr) || last_drawn.contains(addr)
}

fn load_texture(rdp: &mut Rdp, _: Rdram, tracer: &mut dyn Tracer, _: Command) {
    if let Some(cur) = rdp.frame_buffers.current_index() {
        if rdp.frame_buffers[cur].status == CiStatus::Unknown {
            rdp.set_status(cur, CiStatus::Aux, Reason::TextureLoad, tracer);
        }
    }
}

fn set_scissor(rdp: &mut Rdp, _: Rdram, tracer: &mut dyn Tracer, cmd: Command) {
    let ul = CoordWord(cmd.w0);
    let lr = CoordWord(cmd.w1);

    rdp.scissor.lr_y = lr.y_px();

    let Some(cur) = rdp.frame_buffers.current_index() else {
        return;
    };

    rdp.scissor.ul_x = ul.x_px();
    rdp.scissor.lr_x = lr.x_px();

    let ci = rdp.frame_buffers[cur];
    let scissor = rdp.scissor;

    // Games often clip to the real frame buffer size even when the color image didn't say
    if scissor.span() > (ci.width >> 1) as i64
        && (ci.height == 0 || ci.width.abs_diff(scissor.lr_x) <= 1)
    {
        set_height(rdp, tracer, cur, scissor.lr_y, HeightSource::Scissor);
    }
}

/// Fill and texture rectangles covering the whole target give away its height
fn rect(rdp: &mut Rdp, _: Rdram, tracer: &mut dyn Tracer, cmd: Command) {
    let Some(cur) = rdp.frame_buffers.current_index() else {
        return;
    };

    let ci = rdp.frame_buffers[cur];

    if ci.width == 32 {
        return;
    }

    let lr = CoordWord(cmd.w0);
    let ul = CoordWord(cmd.w1);

    let rect_width = lr.x_px() as i64 - ul.x_px() as i64;
    let lr_y = lr.y_px();

    if (ci.width as i64 - rect_width).abs() < 4 && ci.height < lr_y {
        set_height(rdp, tracer, cur, lr_y, HeightSource::Rect);
    }
}

fn bg_copy(rdp: &mut Rdp, rdram: Rdram, tracer: &mut dyn Tracer, cmd: Command) {
    if rdp.main_ci == 0 {
        return;
    }

    let Some(cur) = rdp.frame_buffers.current_index() else {
        return;
    };

    let ci = rdp.frame_buffers[cur];

    if ci.status == CiStatus::Copy {
        return;
    }

    let addr = rdp.segments.resolve(cmd.w1) & BMASK;

    let bg = match BgDescriptor::read(rdram, addr) {
        Ok(bg) => bg,
        Err(e) => {
            warn!("Can't read background object: {}", e);
            tracer.event(FbEvent::DescriptorUnavailable { addr });
            return;
        }
    };

    let image_ptr = rdp.segments.resolve(bg.image_ptr) & BMASK;

    fb_debug!(
        "bg copy fmt {} siz {} image {:08x} main_ci {:08x} cur_ci {:08x}",
        bg.image_fmt,
        bg.image_siz,
        image_ptr,
        rdp.main_ci,
        ci.addr
    );

    if ci.status == CiStatus::Main {
        if bg.frame_width() == ci.width && bg.frame_height() == ci.height {
            rdp.main_ci_bg = image_ptr;
            tracer.event(FbEvent::BackgroundSource { ptr: image_ptr });
        }
    } else if main_range(rdp).contains(image_ptr) {
        rdp.copy_ci_index = cur;
        rdp.set_status(cur, CiStatus::Copy, Reason::BackgroundCopy, tracer);

        if ci.addr != rdp.main_ci_bg {
            rdp.reset_scale(tracer);
        } else {
            rdp.motion_blur = true;
            tracer.event(FbEvent::MotionBlur { index: cur });
        }
    } else if image_ptr == rdp.depth.zimg && ci.status == CiStatus::Unknown {
        rdp.set_status(cur, CiStatus::Zimg, Reason::BackgroundCopy, tracer);
        rdp.depth.tmpzimg = ci.addr;
    }
}
