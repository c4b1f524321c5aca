pub mod list;
pub mod remove;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 列出可卸载的程序
    List(list::ListCommand),

    /// 卸载程序并监管整个卸载过程
    Remove(remove::RemoveCommand),
}
