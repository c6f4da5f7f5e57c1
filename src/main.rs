use clap::Parser;

use bmp_stego::{
    cli::{Cli, Commands},
    handler::{handle_capacity, handle_embed, handle_extract, handle_info, handle_verify},
};

/// 程序的主入口点
///
/// 负责初始化日志、解析命令行参数，并根据指定的子命令
/// 将执行分派到相应的处理函数
fn main() -> anyhow::Result<()> {
    // 日志级别由 RUST_LOG 控制
    env_logger::init();

    // 解析命令行参数
    let cli = Cli::parse();

    // 根据子命令调用相应的处理函数
    match cli.command {
        Commands::Embed(args) => handle_embed(args, &cli.global),
        Commands::Extract(args) => handle_extract(args, &cli.global),
        Commands::Verify(args) => handle_verify(args, &cli.global),
        Commands::Capacity(args) => handle_capacity(args, &cli.global),
        Commands::Info(args) => handle_info(args, &cli.global),
    }
}
