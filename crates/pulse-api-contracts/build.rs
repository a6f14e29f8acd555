// Protobuf 계약 코드 생성 (tonic 클라이언트 + 서버)

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    println!("cargo:rerun-if-changed=proto/pulse/v1/metrics.proto");
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/pulse/v1/metrics.proto"], &["proto"])?;
    Ok(())
}
