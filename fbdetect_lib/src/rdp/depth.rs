//! Depth buffer tracking

use crate::rdp::color_image::{CiStatus, ColorImageRegistry};
use crate::rdp::range::AddrRange;
use crate::rdp::trace::{FbEvent, Reason, Tracer};

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct DepthImage {
    /// Depth buffer address
    pub zimg: u32,
    /// End of the depth buffer. Equal to `zimg` while the extent is unknown.
    pub zimg_end: u32,
    /// Address of a color image found to be used as a depth buffer by a background copy
    pub tmpzimg: u32,
}

impl DepthImage {
    pub fn set(&mut self, zimg: u32, len: u32) {
        self.zimg = zimg;
        self.zimg_end = zimg.saturating_add(len);
    }

    pub fn range(&self) -> AddrRange {
        AddrRange::new(self.zimg, self.zimg_end)
    }

    pub fn extent_known(&self) -> bool {
        self.zimg_end != self.zimg
    }

    /// True if a color image at `addr` draws into the depth buffer
    pub fn aliases(&self, addr: u32) -> bool {
        addr == self.zimg || addr == self.tmpzimg
    }

    /// Retroactively mark auxiliary or useless color images sitting on the depth buffer as depth
    /// images
    pub fn reclassify_aliases(&self, images: &mut ColorImageRegistry, tracer: &mut dyn Tracer) {
        for (index, ci) in images.iter_mut().enumerate() {
            let reusable = matches!(ci.status, CiStatus::Aux | CiStatus::Useless);

            if reusable && ci.addr == self.zimg {
                ci.status = CiStatus::Zimg;
                tracer.event(FbEvent::Status {
                    index,
                    status: CiStatus::Zimg,
                    reason: Reason::DepthReuse,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdp::color_image::ColorImage;

    #[test]
    fn depth_reuse_is_detected() {
        let mut images = ColorImageRegistry::new();
        let statuses = [CiStatus::Main, CiStatus::Aux, CiStatus::Useless, CiStatus::Aux, CiStatus::Copy];
        let addrs = [0x10_0000, 0x20_0000, 0x20_0000, 0x30_0000, 0x20_0000];

        for (&status, &addr) in statuses.iter().zip(addrs.iter()) {
            images.push(ColorImage {
                addr,
                width: 320,
                status,
                ..Default::default()
            });
        }

        let mut depth = DepthImage::default();
        depth.set(0x20_0000, 320 * 240 * 2);

        assert!(depth.extent_known());
        assert!(depth.range().contains(0x20_0000 + 320 * 240 * 2 - 2));

        depth.reclassify_aliases(&mut images, &mut ());

        let got: Vec<CiStatus> = images.iter().map(|ci| ci.status).collect();
        assert_eq!(
            got,
            [CiStatus::Main, CiStatus::Zimg, CiStatus::Zimg, CiStatus::Aux, CiStatus::Copy]
        );
    }
}
