pub mod io;

pub use io::stream_to_file;
