use std::io;
fn main() -> io::Result<()> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/rpc.proto"], &["proto/"])?;
    Ok(())
}
