use std::io::Result;
use std::path::PathBuf;

fn main() -> Result<()> {
    let proto_root = PathBuf::from("proto");
    let out_dir = PathBuf::from("src/gen");

    let protos = ["statusnotify.proto"];

    let proto_paths: Vec<PathBuf> = protos.iter().map(|p| proto_root.join(p)).collect();

    std::fs::create_dir_all(&out_dir)?;

    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .out_dir(&out_dir)
        .compile_protos(&proto_paths, &[&proto_root])?;

    for proto in &protos {
        println!(
            "cargo:rerun-if-changed={}",
            proto_root.join(proto).display()
        );
    }

    Ok(())
}
