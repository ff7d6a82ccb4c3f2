/// DOM contract of the retailer site.
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub home_url: &'static str,
    pub cookie_accept_tag: &'static str,
    pub cookie_accept_text: &'static str,

    pub logged_in_badge: &'static str,
    pub login_icon: &'static str,
    pub username_input: &'static str,
    pub password_input: &'static str,
    pub login_button_tag: &'static str,
    pub login_button_text: &'static str,

    pub flash_message: &'static str,
    pub session_expired_text: &'static str,

    pub product_title: &'static str,
    pub ean_label: &'static str,
    pub ean_prefix: &'static str,
    pub price: &'static str,
    pub in_stock_marker: &'static str,
    /// Container that must exist before the in-stock marker is trusted. The
    /// live site renders nothing for out-of-stock items, so it is unset there.
    pub stock_status: Option<&'static str>,

    pub total_results: &'static str,
    pub per_page_toggle: &'static str,
    pub per_page_max_option: &'static str,
    pub page_size_query: &'static str,
    pub pagination: &'static str,
    pub pagination_item: &'static str,
    pub product_card: &'static str,
    pub product_link: &'static str,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            home_url: "https://www.difox.com/en",
            cookie_accept_tag: "span",
            cookie_accept_text: "Accept all cookies",

            logged_in_badge: ".loginBox__badge",
            login_icon: ".loginBox__iconWrapper",
            username_input: "#login-username",
            password_input: "#login-password",
            login_button_tag: "button",
            login_button_text: "Login",

            flash_message: ".layout__flashMessageWrapper",
            session_expired_text: "Your session ran out. Please login again.",

            product_title: ".productDisplay__title",
            ean_label: ".is--eanCode",
            ean_prefix: "EAN code:",
            price: ".price__price",
            in_stock_marker: ".is--available",
            stock_status: None,

            total_results: ".displayProducts__number",
            per_page_toggle: ".displayProducts__perPage-select button",
            per_page_max_option: "button[aria-posinset=\"4\"]",
            page_size_query: "pageSize=100",
            pagination: "ul.pagination",
            pagination_item: "li",
            product_card: ".displayProducts__chooseView article",
            product_link: "a",
        }
    }
}
