/// Last declared clipping rectangle, in pixels
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Scissor {
    pub ul_x: u32,
    pub lr_x: u32,
    pub lr_y: u32,
}

impl Scissor {
    /// Horizontal clip span. Negative if the rectangle is inverted.
    pub fn span(&self) -> i64 {
        self.lr_x as i64 - self.ul_x as i64
    }
}
