/// Number of fixed-function counters managed by a session.
pub const FIXED_COUNTERS: usize = 3;

/// Mnemonic and description of each fixed counter, in counter order.
pub const FIXED_LABELS: [(&str, &str); FIXED_COUNTERS] = [
    ("F0", "instructions retired"),
    ("F1", "unhalted core cycles"),
    ("F2", "unhalted reference cycles"),
];

const FIELD_WIDTH: u32 = 4;
const OS: u64 = 1 << 0;
const USR: u64 = 1 << 1;
const ANY_THREAD: u64 = 1 << 2;
const PMI: u64 = 1 << 3;

/// `IA32_FIXED_CTR_CTRL` word: one 4-bit field per fixed counter.
///
/// The default counts all three fixed counters in user mode with no
/// interrupt on overflow (`0x222`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedCtrl(pub u64);

impl FixedCtrl {
    pub const USER: FixedCtrl = FixedCtrl::ring(true, false);

    /// Counts all fixed counters in the selected privilege rings.
    pub const fn ring(user: bool, os: bool) -> Self {
        let mut field = 0;
        if user {
            field |= USR;
        }
        if os {
            field |= OS;
        }
        let mut word = 0;
        let mut i = 0;
        while i < FIXED_COUNTERS as u32 {
            word |= field << (i * FIELD_WIDTH);
            i += 1;
        }
        Self(word)
    }

    /// The 4-bit control field of fixed counter `index`.
    pub const fn field(self, index: usize) -> u64 {
        (self.0 >> (index as u32 * FIELD_WIDTH)) & 0xf
    }

    pub const fn counts_user(self, index: usize) -> bool {
        self.field(index) & USR != 0
    }

    pub const fn counts_os(self, index: usize) -> bool {
        self.field(index) & OS != 0
    }

    pub const fn any_thread(self, index: usize) -> bool {
        self.field(index) & ANY_THREAD != 0
    }

    pub const fn interrupts(self, index: usize) -> bool {
        self.field(index) & PMI != 0
    }
}

impl Default for FixedCtrl {
    fn default() -> Self {
        Self::USER
    }
}
