/// HTTP tests driving the axum router in-process.

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use media_converter::{
        config::Config,
        converter::default_capabilities,
        handler::ConversionHandler,
        server::{router, AppState},
    };
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::io::Cursor;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "media-converter-test-boundary";

    enum Part<'a> {
        File {
            name: &'a str,
            file_name: &'a str,
            content: &'a [u8],
        },
        Text {
            name: &'a str,
            value: &'a str,
        },
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File {
                    name,
                    file_name,
                    content,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(content);
                }
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn app_with(config: Config) -> Router {
        let handler = ConversionHandler::new(config.handler_config(), default_capabilities(&config));
        router(Arc::new(AppState::new(config, handler)))
    }

    fn app() -> Router {
        app_with(Config::default())
    }

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(8, 8, Rgb([200u8, 30, 30]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_formats_listing() {
        let response = app()
            .oneshot(Request::builder().uri("/formats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let extensions: Vec<&str> = body["supported_extensions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(extensions.contains(&"png"));
        assert!(extensions.contains(&"mp3"));
        assert_eq!(body["formats"][0]["extension"], "jpg");
        assert_eq!(body["formats"][0]["kind"], "image");
    }

    #[tokio::test]
    async fn test_convert_batch_reports_per_file_results() {
        let png = png_bytes();
        let request = multipart_request(
            "/convert",
            &[
                Part::File {
                    name: "file",
                    file_name: "a.png",
                    content: &png,
                },
                Part::File {
                    name: "file",
                    file_name: "b.txt",
                    content: b"hello there",
                },
                Part::Text {
                    name: "file_type",
                    value: "png",
                },
                Part::Text {
                    name: "file_type",
                    value: "png",
                },
                Part::Text {
                    name: "convert_to",
                    value: "JPG",
                },
                Part::Text {
                    name: "quality",
                    value: "80",
                },
            ],
        );

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["target_format"], "JPG");
        assert_eq!(body["succeeded"], 1);
        assert_eq!(body["failed"], 1);

        let first = &body["results"][0];
        assert_eq!(first["status"], "success");
        assert_eq!(first["converted_file_name"], "a.jpg");
        assert_eq!(first["format"], "jpg");
        let jpeg = BASE64.decode(first["data"].as_str().unwrap()).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(first["size"], jpeg.len());

        let second = &body["results"][1];
        assert_eq!(second["status"], "error");
        assert_eq!(second["file_name"], "b.txt");
        assert_eq!(second["error"], "corrupt_input");
    }

    #[tokio::test]
    async fn test_convert_without_files() {
        let request = multipart_request(
            "/convert",
            &[Part::Text {
                name: "convert_to",
                value: "png",
            }],
        );

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "missing_file");
    }

    #[tokio::test]
    async fn test_convert_without_target() {
        let png = png_bytes();
        let request = multipart_request(
            "/convert",
            &[Part::File {
                name: "file",
                file_name: "a.png",
                content: &png,
            }],
        );

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "missing_target_format");
    }

    #[tokio::test]
    async fn test_download_returns_attachment() {
        let png = png_bytes();
        let request = multipart_request(
            "/download",
            &[
                Part::File {
                    name: "file",
                    file_name: "../../photo.png",
                    content: &png,
                },
                Part::Text {
                    name: "convert_to",
                    value: "bmp",
                },
            ],
        );

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/bmp");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"photo.bmp\""
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..2], b"BM");
    }

    #[tokio::test]
    async fn test_download_unsupported_target() {
        let png = png_bytes();
        let request = multipart_request(
            "/download",
            &[
                Part::File {
                    name: "file",
                    file_name: "photo.png",
                    content: &png,
                },
                Part::Text {
                    name: "convert_to",
                    value: "gif",
                },
            ],
        );

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "unsupported_format");
        assert!(body["supported_extensions"].as_array().unwrap().len() > 10);
    }

    #[tokio::test]
    async fn test_download_mismatched_kind() {
        let png = png_bytes();
        let request = multipart_request(
            "/download",
            &[
                Part::File {
                    name: "file",
                    file_name: "photo.png",
                    content: &png,
                },
                Part::Text {
                    name: "convert_to",
                    value: "mp3",
                },
            ],
        );

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "mismatched_media_kind");
    }

    #[tokio::test]
    async fn test_download_rejects_multiple_files() {
        let png = png_bytes();
        let request = multipart_request(
            "/download",
            &[
                Part::File {
                    name: "file",
                    file_name: "a.png",
                    content: &png,
                },
                Part::File {
                    name: "file",
                    file_name: "b.png",
                    content: &png,
                },
                Part::Text {
                    name: "convert_to",
                    value: "jpg",
                },
            ],
        );

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "too_many_files");
    }

    #[tokio::test]
    async fn test_upload_limit() {
        let config = Config {
            max_upload_bytes: 1024,
            ..Config::default()
        };
        let big = vec![0u8; 4096];
        let request = multipart_request(
            "/convert",
            &[
                Part::File {
                    name: "file",
                    file_name: "big.png",
                    content: &big,
                },
                Part::Text {
                    name: "convert_to",
                    value: "jpg",
                },
            ],
        );

        let response = app_with(config).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "http://localhost:8080")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
