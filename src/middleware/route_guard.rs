// src/middleware/route_guard.rs

// Diz se uma rota do console é pública (login, recuperar senha...)
// ou protegida (exige usuário logado e liga o relógio de sessão).
#[derive(Debug, Clone)]
pub struct RouteGuard {
    public_paths: Vec<String>,
}

const DEFAULT_LOGIN_PATH: &str = "/login";

fn normalize(path: &str) -> &str {
    // Ignora query string, fragmento e barra final
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

impl RouteGuard {
    pub fn new<I, S>(public_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let public_paths = public_paths
            .into_iter()
            .map(|p| normalize(p.as_ref().trim()).to_string())
            .filter(|p| p != "/")
            .collect();
        Self { public_paths }
    }

    /// Pública se for igual a um caminho público ou estiver debaixo dele.
    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize(path);
        self.public_paths.iter().any(|public| {
            path == public
                || path
                    .strip_prefix(public.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn is_protected(&self, path: &str) -> bool {
        !self.is_public(path)
    }

    /// Para onde mandar o usuário quando a sessão cai.
    pub fn login_path(&self) -> &str {
        self.public_paths
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_LOGIN_PATH)
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(["/login", "/forgot-password"])
    }
}
