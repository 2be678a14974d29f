//! Presentation shared by every Recall binary: version string and help colors.

use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};

/// `<crate version> (<git sha> <target triple>)`, stamped at build time.
pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	" (",
	env!("VERGEN_GIT_SHA"),
	" ",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
	")",
);

pub fn styles() -> Styles {
	let accent = AnsiColor::Cyan.on_default() | Effects::BOLD;

	Styles::styled()
		.header(accent)
		.usage(accent)
		.literal(AnsiColor::Green.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
		.valid(AnsiColor::Green.on_default())
		.invalid(AnsiColor::Red.on_default())
}
