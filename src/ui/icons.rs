//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "");

// Status table markers
pub static DONE_MARK: Emoji<'_, '_> = Emoji("✓", "+");
pub static FAILED_MARK: Emoji<'_, '_> = Emoji("✗", "x");
pub static PENDING_MARK: Emoji<'_, '_> = Emoji("○", "-");
