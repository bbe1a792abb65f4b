//! Identity this process advertises to connecting peers

use poligent_protocol::Frame;

/// Product tag poligent advertises
pub const PRODUCT: &str = "poligent";

/// Environment variable supplying the container id
pub const CONTAINER_ID_ENV: &str = "HOSTNAME";

/// Container id and product tag sent in our `open` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub container_id: String,
    pub product: String,
}

impl ProcessIdentity {
    /// Create an identity from explicit values
    pub fn new(container_id: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            product: product.into(),
        }
    }

    /// Resolve the container id from an override, `$HOSTNAME`, or the
    /// system hostname, in that order
    pub fn resolve(container_id: Option<&str>, product: impl Into<String>) -> Self {
        let container_id = container_id
            .map(str::to_string)
            .or_else(|| {
                std::env::var(CONTAINER_ID_ENV)
                    .ok()
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned());
        Self::new(container_id, product)
    }

    /// Frame announcing this identity
    pub fn open_frame(&self) -> Frame {
        Frame::open(self.container_id.clone(), self.product.clone())
    }
}
