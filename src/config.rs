use std::env;

pub struct RazorpaySettings {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    /// Plan used for the Pro subscription checkout.
    pub pro_plan_id: String,
    /// Amount in currency subunits, recorded on each attempt.
    pub plan_amount: i64,
    pub plan_currency: String,
}

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub razorpay: RazorpaySettings,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");

        let razorpay = RazorpaySettings {
            key_id: env::var("RAZORPAY_KEY_ID").expect("RAZORPAY_KEY_ID must be set"),
            key_secret: env::var("RAZORPAY_KEY_SECRET").expect("RAZORPAY_KEY_SECRET must be set"),
            webhook_secret: env::var("RAZORPAY_WEBHOOK_SECRET")
                .expect("RAZORPAY_WEBHOOK_SECRET must be set"),
            pro_plan_id: env::var("RAZORPAY_PRO_PLAN_ID")
                .expect("RAZORPAY_PRO_PLAN_ID must be set"),
            plan_amount: env::var("PRO_PLAN_AMOUNT")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(200),
            plan_currency: env::var("PRO_PLAN_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
        };

        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "revio".to_string());
        let jwt_audience = env::var("JWT_AUDIENCE").unwrap_or_else(|_| "revio-api".to_string());

        Config {
            database_url,
            frontend_origin,
            razorpay,
            jwt_issuer,
            jwt_audience,
        }
    }
}
