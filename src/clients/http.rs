use async_trait::async_trait;
use rquest::multipart::{Form, Part};
use rquest::Client;
use rquest_util::Emulation;
use std::time::Duration;
use tracing::debug;

use crate::clients::{OutboundRequest, RawResponse, Transport};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::{FormPayload, FormValue, RequestBody};

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let emulation = parse_emulation(&settings.api.emulation)?;

        debug!(
            emulation = ?emulation,
            timeout_secs = settings.api.timeout_secs,
            "Creating client with emulation"
        );

        let client = Client::builder()
            .emulation(emulation)
            .timeout(Duration::from_secs(settings.api.timeout_secs))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.body(serde_json::to_vec(&body)?),
            RequestBody::Form(form) => builder.multipart(to_multipart(form)?),
        };

        debug!(
            method = %request.method,
            url = %request.url,
            "Sending request"
        );

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(
            status = status.as_u16(),
            url = %request.url,
            bytes = body.len(),
            "Response received"
        );

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn to_multipart(form: FormPayload) -> Result<Form> {
    let mut multipart = Form::new();
    for field in form.fields {
        multipart = match field.value {
            FormValue::Text(text) => multipart.text(field.name, text),
            FormValue::File { file_name, content_type, bytes } => {
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(|_| {
                        Error::InvalidRequest(format!(
                            "invalid content type {:?} for form field {}",
                            content_type, field.name
                        ))
                    })?;
                multipart.part(field.name, part)
            }
        };
    }
    Ok(multipart)
}

fn parse_emulation(name: &str) -> Result<Emulation> {
    match name.to_ascii_lowercase().as_str() {
        "chrome133" => Ok(Emulation::Chrome133),
        "firefox136" => Ok(Emulation::Firefox136),
        "safari18_3" => Ok(Emulation::Safari18_3),
        "edge134" => Ok(Emulation::Edge134),
        other => Err(Error::InvalidRequest(format!(
            "unsupported client emulation: {}",
            other
        ))),
    }
}
