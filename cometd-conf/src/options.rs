use structopt::StructOpt;

use cometd_utils::Bytesize;

#[derive(StructOpt, Debug, Clone, Default)]
pub struct Options {
    /// Config filename
    #[structopt(name = "config", short = "f", long)]
    pub cfg_name: Option<String>,

    /// Serialized messages larger than this are gzipped, e.g. "50K", 0 compresses everything
    #[structopt(name = "zip-threshold", long)]
    pub zip_message_size_threshold: Option<Bytesize>,

    /// Leave the "data" field out of frozen messages whose payload is null
    #[structopt(name = "ignore-null-data", long)]
    pub ignore_null_data: Option<bool>,
}
