//! # bmp_stego 库
//!
//! 把任意文件隐藏到未压缩 24/32 位 BMP 像素数据的最低有效位中，并可无损恢复。
//!
//! ```no_run
//! use bmp_stego::SteganographyCodec;
//!
//! let codec = SteganographyCodec::new();
//! let hided = codec.embed("photo.bmp", "notes.txt", "out", None)?;
//! assert!(codec.verify(&hided, None)?);
//! let recovered = codec.extract(&hided, "out", None)?;
//! # Ok::<(), bmp_stego::CodecError>(())
//! ```

// 声明库包含的所有模块。

pub mod bits;
pub mod bmp;
pub mod cli;
pub mod codec;
pub mod constants;
pub mod error;
pub mod files;
pub mod handler;
pub mod header;
pub mod progress;
pub mod steganography;

pub use codec::{CodecOptions, ContainerInfo, SteganographyCodec};
pub use error::{CodecError, Operation, StegoError};
pub use header::HideDataHeader;
pub use progress::{CancellationToken, Progress, ProgressHandler, Stage};
