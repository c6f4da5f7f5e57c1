/// BMP 文件头 (BITMAPFILEHEADER) 的固定大小 (字节)。
pub const FILE_HEADER_SIZE: usize = 14;

/// DIB 信息头 (BITMAPINFOHEADER) 的固定大小 (字节)。
pub const INFO_HEADER_SIZE: usize = 40;

/// 两个头部合计的大小，像素数据偏移量不得小于该值。
pub const BMP_HEADER_SIZE: usize = FILE_HEADER_SIZE + INFO_HEADER_SIZE;

/// "BM" 的小端表示。
pub const BMP_MAGIC: u16 = 0x4D42;

/// 支持的位深度。
pub const SUPPORTED_BIT_COUNTS: [u16; 2] = [24, 32];

/// 隐写数据头的标识，恰好 8 个字节，没有结尾的 NUL。
pub const HIDE_MAGIC: [u8; 8] = *b"SDSC0623";

/// 隐写数据头的大小 (字节): 4 字节长度 + 8 字节标识 + 8 字节扩展名。
pub const HIDE_HEADER_SIZE: usize = 20;

/// 隐写数据头占用的像素字节数，每个像素字节承载 1 bit。
pub const HIDE_HEADER_BITS: usize = HIDE_HEADER_SIZE * 8;

/// 扩展名字段长度，最多保存 7 个有效字符，最后一个字节保留为 0。
pub const EXTENSION_FIELD_SIZE: usize = 8;

/// 分块读写文件时使用的默认块大小。
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// 一次操作内期望的进度更新次数。
pub const DEFAULT_PROGRESS_UPDATES: usize = 80;

/// 嵌入/提取循环中每批处理的最少 bit 数。
pub const MIN_BATCH_BITS: usize = 100;

/// 隐写后图像的文件名后缀。
pub const HIDED_SUFFIX: &str = "_hided";

/// 提取出的文件的文件名后缀。
pub const EXTRACTED_SUFFIX: &str = "_extracted";
