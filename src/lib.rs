//! PhotoMark: canvas core of a photo-annotation editor.
//!
//! [`editor::Editor`] owns one raster image and turns pointer/keyboard input
//! into brush strokes, arrows, shapes, blur redactions, crops and text, with
//! full-snapshot undo/redo. Everything here is headless; a front end only
//! forwards events and displays [`editor::Editor::image`].

#![allow(clippy::too_many_arguments)]

pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod io;
pub mod logger;
pub mod ops;
pub mod settings;

pub use editor::{Editor, PointerButton};
