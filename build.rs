use tonic_build::manual::{Builder, Method, Service};

fn unary(name: &str, route_name: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route_name)
        .input_type(input)
        .output_type(output)
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    // Service glue for the messages declared in src/contract/example.rs.
    let example_service = Service::builder()
        .name("ExampleService")
        .package("example.v1")
        .method(unary(
            "say_hello",
            "SayHello",
            "crate::contract::example::ExampleRequest",
            "crate::contract::example::ExampleResponse",
        ))
        .method(unary(
            "say_goodbye",
            "SayGoodbye",
            "crate::contract::example::ExampleRequest",
            "crate::contract::example::ExampleResponse",
        ))
        .method(unary(
            "health_check",
            "HealthCheck",
            "crate::contract::example::HealthCheckRequest",
            "crate::contract::example::HealthCheckResponse",
        ))
        .build();

    Builder::new().compile(&[example_service]);

    println!("cargo:rerun-if-changed=build.rs");
}
