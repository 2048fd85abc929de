use serde::{Deserialize, Serialize};

/// Stable logical input codes. Each code owns one bit position in the
/// recorded per-frame mask; the core never sees physical key or controller
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputCode {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Shoot,
    Bomb,
    Slow,
    Pause,
    MenuSelect,
    MenuCancel,
    SpeedUp,
}

impl InputCode {
    pub const ALL: [InputCode; 11] = [
        InputCode::MoveUp,
        InputCode::MoveDown,
        InputCode::MoveLeft,
        InputCode::MoveRight,
        InputCode::Shoot,
        InputCode::Bomb,
        InputCode::Slow,
        InputCode::Pause,
        InputCode::MenuSelect,
        InputCode::MenuCancel,
        InputCode::SpeedUp,
    ];

    const fn bit(self) -> u32 {
        match self {
            InputCode::MoveUp => 0,
            InputCode::MoveDown => 1,
            InputCode::MoveLeft => 2,
            InputCode::MoveRight => 3,
            InputCode::Shoot => 4,
            InputCode::Bomb => 5,
            InputCode::Slow => 6,
            InputCode::Pause => 7,
            InputCode::MenuSelect => 8,
            InputCode::MenuCancel => 9,
            InputCode::SpeedUp => 10,
        }
    }
}

/// One simulated frame's worth of held inputs, bit i = code i held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMask(pub u32);

impl InputMask {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, code: InputCode) -> Self {
        self.set(code, true);
        self
    }

    pub fn set(&mut self, code: InputCode, held: bool) {
        let bit = 1u32 << code.bit();
        if held {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn is_held(self, code: InputCode) -> bool {
        self.0 & (1u32 << code.bit()) != 0
    }
}
