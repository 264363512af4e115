//! Per-microcode dispatch of display list opcodes.
//!
//! Each microcode encodes similar operations with different opcodes. The tables below only list
//! the slots that matter for frame buffer detection: either a frame buffer handler, or a display
//! list operation the host has to perform itself. Every other slot is unsupported.

use std::sync::OnceLock;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use crate::error::{FbError, FbResult};

/// Number of known microcode dialects
pub const UCODE_COUNT: usize = 9;

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, Debug, FromPrimitive)]
#[repr(u8)]
pub enum Ucode {
    /// RSP SW 2.0X (Super Mario 64, Tetrisphere)
    F3d = 0,
    /// F3DEX 1.xx (Mario Kart, Star Fox)
    F3dex = 1,
    /// F3DEX 2.xx (Zelda 64)
    F3dex2 = 2,
    /// "RSP SW 2.0D", but not really (Wave Race)
    WaveRace = 3,
    /// RSP SW 2.0D EXT (Shadows of the Empire)
    F3dExt = 4,
    /// RSP SW 2.0 Diddy (Diddy Kong Racing)
    Diddy = 5,
    /// S2DEX 1.xx (Yoshi's Story)
    S2dex = 6,
    /// Perfect Dark
    PerfectDark = 7,
    /// F3DEX2 variant used by Conker's Bad Fur Day
    F3dex2Cbfd = 8,
}

impl Ucode {
    pub const ALL: [Ucode; UCODE_COUNT] = [
        Ucode::F3d,
        Ucode::F3dex,
        Ucode::F3dex2,
        Ucode::WaveRace,
        Ucode::F3dExt,
        Ucode::Diddy,
        Ucode::S2dex,
        Ucode::PerfectDark,
        Ucode::F3dex2Cbfd,
    ];

    pub fn from_id(id: u32) -> FbResult<Ucode> {
        Ucode::from_u32(id).ok_or(FbError::UnknownUcode(id))
    }

    pub fn id(self) -> usize {
        self as usize
    }

    /// True for the F3DEX2 command layout
    pub fn is_f3dex2(self) -> bool {
        matches!(self, Ucode::F3dex2 | Ucode::F3dex2Cbfd)
    }
}

/// Frame buffer commands handled by the detector
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FbOp {
    MoveWordUc0,
    MoveWordUc2,
    BgCopy,
    SetScissor,
    Rect,
    SetTextureImage,
    LoadTexture,
    SetDepthImage,
    SetColorImage,
}

/// Display list operations the host performs on behalf of the detector
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HostOp {
    DisplayList,
    EndDisplayList,
    /// Cull with vertex indices scaled by the F3D vertex size
    CullDisplayListUc0,
    /// Cull with vertex indices scaled by 2, as in F3DEX and later
    CullDisplayListUc2,
    BranchZ,
    RdpHalf1,
    LoadUcode,
    DisplayListCount,
    DisplayListInMem,
    SelectDisplayList,
    RdpNoop,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Fb(FbOp),
    Host(HostOp),
}

/// Outcome of feeding one command to the detector
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Dispatch {
    /// A frame buffer handler ran
    Handled(FbOp),
    /// The host has to perform this display list operation
    Forward(HostOp),
    /// Not relevant to frame buffer detection
    Unsupported,
    /// The pass was halted, the command was ignored
    Halted,
}

use self::FbOp::*;
use self::HostOp::*;

type Entries = &'static [(u8, Op)];

/// RDP commands, shared by every microcode
const RDP: Entries = &[
    (0xe4, Op::Fb(Rect)),
    (0xe5, Op::Fb(Rect)),
    (0xed, Op::Fb(SetScissor)),
    (0xf6, Op::Fb(Rect)),
    (0xfd, Op::Fb(SetTextureImage)),
    (0xfe, Op::Fb(SetDepthImage)),
    (0xff, Op::Fb(SetColorImage)),
];

const F3D: Entries = &[
    (0x06, Op::Host(DisplayList)),
    (0xb8, Op::Host(EndDisplayList)),
    (0xbc, Op::Fb(MoveWordUc0)),
    (0xbe, Op::Host(CullDisplayListUc0)),
];

const F3DEX: Entries = &[
    (0x06, Op::Host(DisplayList)),
    (0xaf, Op::Host(LoadUcode)),
    (0xb0, Op::Host(BranchZ)),
    (0xb4, Op::Host(RdpHalf1)),
    (0xb8, Op::Host(EndDisplayList)),
    (0xbc, Op::Fb(MoveWordUc0)),
    (0xbe, Op::Host(CullDisplayListUc2)),
];

const F3DEX2: Entries = &[
    (0x03, Op::Host(CullDisplayListUc2)),
    (0x04, Op::Host(BranchZ)),
    (0x09, Op::Fb(BgCopy)),
    (0x0a, Op::Fb(BgCopy)),
    (0xd5, Op::Host(DisplayListCount)),
    (0xdb, Op::Fb(MoveWordUc2)),
    (0xdd, Op::Host(LoadUcode)),
    (0xde, Op::Host(DisplayList)),
    (0xdf, Op::Host(EndDisplayList)),
    (0xe1, Op::Host(RdpHalf1)),
];

// Wave Race has no display list call in the immediate range
const WAVE_RACE: Entries = &[
    (0xb8, Op::Host(EndDisplayList)),
    (0xbc, Op::Fb(MoveWordUc0)),
    (0xbe, Op::Host(CullDisplayListUc0)),
];

const F3D_EXT: Entries = &[
    (0x06, Op::Host(DisplayList)),
    (0xb8, Op::Host(EndDisplayList)),
    (0xbc, Op::Fb(MoveWordUc0)),
    (0xbe, Op::Host(CullDisplayListUc0)),
    (0xc0, Op::Host(RdpNoop)),
];

const DIDDY: Entries = &[
    (0x06, Op::Host(DisplayList)),
    (0x07, Op::Host(DisplayListInMem)),
    (0xb8, Op::Host(EndDisplayList)),
    (0xbc, Op::Fb(MoveWordUc0)),
    (0xbe, Op::Host(CullDisplayListUc0)),
];

const S2DEX: Entries = &[
    (0x06, Op::Host(DisplayList)),
    (0xaf, Op::Host(LoadUcode)),
    (0xb0, Op::Host(SelectDisplayList)),
    (0xb8, Op::Host(EndDisplayList)),
    (0xbc, Op::Fb(MoveWordUc0)),
    (0xbe, Op::Host(CullDisplayListUc2)),
    (0xc1, Op::Fb(LoadTexture)),
    (0xc2, Op::Fb(LoadTexture)),
    (0xc3, Op::Fb(LoadTexture)),
    (0xc4, Op::Fb(LoadTexture)),
];

fn ucode_entries(ucode: Ucode) -> Entries {
    match ucode {
        Ucode::F3d | Ucode::PerfectDark => F3D,
        Ucode::F3dex => F3DEX,
        Ucode::F3dex2 | Ucode::F3dex2Cbfd => F3DEX2,
        Ucode::WaveRace => WAVE_RACE,
        Ucode::F3dExt => F3D_EXT,
        Ucode::Diddy => DIDDY,
        Ucode::S2dex => S2DEX,
    }
}

/// LUT for every microcode, indexed by microcode then by opcode (bits [31:24] of the first
/// command word)
pub struct DispatchTable {
    slots: [[Option<Op>; 0x100]; UCODE_COUNT],
}

impl DispatchTable {
    fn build() -> DispatchTable {
        let mut slots = [[None; 0x100]; UCODE_COUNT];

        for ucode in Ucode::ALL {
            let table = &mut slots[ucode.id()];

            for &(opcode, op) in ucode_entries(ucode).iter().chain(RDP) {
                debug_assert!(table[opcode as usize].is_none(), "{:?} {:02x}", ucode, opcode);
                table[opcode as usize] = Some(op);
            }
        }

        DispatchTable { slots }
    }

    /// The table is built the first time it's needed and never changes afterwards
    pub fn get() -> &'static DispatchTable {
        static TABLE: OnceLock<DispatchTable> = OnceLock::new();

        TABLE.get_or_init(DispatchTable::build)
    }

    pub fn lookup(&self, ucode: Ucode, opcode: u8) -> Option<Op> {
        self.slots[ucode.id()][opcode as usize]
    }

    /// Non-empty slots of `ucode`'s table, by increasing opcode
    pub fn entries(&self, ucode: Ucode) -> impl Iterator<Item = (u8, Op)> + '_ {
        self.slots[ucode.id()]
            .iter()
            .enumerate()
            .filter_map(|(opcode, op)| op.map(|op| (opcode as u8, op)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ucode_ids() {
        for (id, ucode) in Ucode::ALL.iter().enumerate() {
            assert_eq!(Ucode::from_id(id as u32).unwrap(), *ucode);
            assert_eq!(ucode.id(), id);
        }

        assert!(matches!(Ucode::from_id(9), Err(FbError::UnknownUcode(9))));
    }

    #[test]
    fn rdp_commands_everywhere() {
        let table = DispatchTable::get();

        for ucode in Ucode::ALL {
            assert_eq!(table.lookup(ucode, 0xff), Some(Op::Fb(SetColorImage)));
            assert_eq!(table.lookup(ucode, 0xfe), Some(Op::Fb(SetDepthImage)));
            assert_eq!(table.lookup(ucode, 0xfd), Some(Op::Fb(SetTextureImage)));
            assert_eq!(table.lookup(ucode, 0xed), Some(Op::Fb(SetScissor)));
            assert_eq!(table.lookup(ucode, 0xf6), Some(Op::Fb(Rect)));
            assert_eq!(table.lookup(ucode, 0xe4), Some(Op::Fb(Rect)));
            assert_eq!(table.lookup(ucode, 0xe5), Some(Op::Fb(Rect)));
            // Load sync, pipe sync and friends are ignored
            assert_eq!(table.lookup(ucode, 0xe6), None);
            assert_eq!(table.lookup(ucode, 0x00), None);
        }
    }

    #[test]
    fn move_word_layouts() {
        let table = DispatchTable::get();

        for ucode in Ucode::ALL {
            if ucode.is_f3dex2() {
                assert_eq!(table.lookup(ucode, 0xdb), Some(Op::Fb(MoveWordUc2)));
                assert_eq!(table.lookup(ucode, 0xbc), None);
                assert_eq!(table.lookup(ucode, 0x09), Some(Op::Fb(BgCopy)));
            } else {
                assert_eq!(table.lookup(ucode, 0xbc), Some(Op::Fb(MoveWordUc0)));
                assert_eq!(table.lookup(ucode, 0xdb), None);
                assert_eq!(table.lookup(ucode, 0x09), None);
            }
        }
    }

    #[test]
    fn dialect_quirks() {
        let table = DispatchTable::get();

        assert_eq!(table.lookup(Ucode::WaveRace, 0x06), None);
        assert_eq!(table.lookup(Ucode::Diddy, 0x07), Some(Op::Host(DisplayListInMem)));
        assert_eq!(table.lookup(Ucode::F3dExt, 0xc0), Some(Op::Host(RdpNoop)));
        assert_eq!(table.lookup(Ucode::S2dex, 0xb0), Some(Op::Host(SelectDisplayList)));
        assert_eq!(table.lookup(Ucode::F3dex, 0xb0), Some(Op::Host(BranchZ)));

        let loads: Vec<u8> = table
            .entries(Ucode::S2dex)
            .filter(|&(_, op)| op == Op::Fb(LoadTexture))
            .map(|(opcode, _)| opcode)
            .collect();
        assert_eq!(loads, [0xc1, 0xc2, 0xc3, 0xc4]);

        assert_eq!(table.entries(Ucode::F3d).count(), 11);
        assert_eq!(table.entries(Ucode::F3dex2).count(), 17);
        assert_eq!(table.entries(Ucode::WaveRace).count(), 10);
    }

    #[test]
    fn cull_layouts() {
        let table = DispatchTable::get();

        let f3d_family = [
            Ucode::F3d,
            Ucode::PerfectDark,
            Ucode::WaveRace,
            Ucode::F3dExt,
            Ucode::Diddy,
        ];

        for ucode in f3d_family {
            assert_eq!(table.lookup(ucode, 0xbe), Some(Op::Host(CullDisplayListUc0)));
        }

        for ucode in [Ucode::F3dex, Ucode::S2dex] {
            assert_eq!(table.lookup(ucode, 0xbe), Some(Op::Host(CullDisplayListUc2)));
        }

        for ucode in [Ucode::F3dex2, Ucode::F3dex2Cbfd] {
            assert_eq!(table.lookup(ucode, 0x03), Some(Op::Host(CullDisplayListUc2)));
            assert_eq!(table.lookup(ucode, 0xbe), None);
        }
    }
}
